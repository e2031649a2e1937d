//! Expression lowering.
//!
//! Post-order traversal onto the VM's operand stack. `*` and `/` have no VM
//! opcode and compile to `Math.multiply` / `Math.divide` calls. Call dispatch
//! mirrors the analyzer's resolution: the receiver's shape and the symbol
//! table decide between a static call and a method call with the instance
//! prepended.

use super::{CodeGen, CodeGenError};
use crate::ast::{BinaryOp, Expr, ExprKind, KeywordLit, SubroutineKind, UnaryOp};
use std::fmt::Write as _;

impl CodeGen<'_> {
    pub(super) fn generate_expression(&mut self, expr: &Expr) -> Result<(), CodeGenError> {
        match &expr.kind {
            ExprKind::Int(n) => {
                writeln!(&mut self.output, "push constant {}", n)?;
                Ok(())
            }
            ExprKind::Str(text) => self.generate_string(text),
            ExprKind::Keyword(lit) => {
                match lit {
                    // true is all ones
                    KeywordLit::True => {
                        writeln!(&mut self.output, "push constant 0")?;
                        writeln!(&mut self.output, "not")?;
                    }
                    KeywordLit::False | KeywordLit::Null => {
                        writeln!(&mut self.output, "push constant 0")?;
                    }
                    KeywordLit::This => {
                        writeln!(&mut self.output, "push pointer 0")?;
                    }
                }
                Ok(())
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.generate_expression(lhs)?;
                self.generate_expression(rhs)?;
                match op {
                    BinaryOp::Add => writeln!(&mut self.output, "add")?,
                    BinaryOp::Sub => writeln!(&mut self.output, "sub")?,
                    BinaryOp::And => writeln!(&mut self.output, "and")?,
                    BinaryOp::Or => writeln!(&mut self.output, "or")?,
                    BinaryOp::Lt => writeln!(&mut self.output, "lt")?,
                    BinaryOp::Gt => writeln!(&mut self.output, "gt")?,
                    BinaryOp::Eq => writeln!(&mut self.output, "eq")?,
                    BinaryOp::Mul => writeln!(&mut self.output, "call Math.multiply 2")?,
                    BinaryOp::Div => writeln!(&mut self.output, "call Math.divide 2")?,
                }
                Ok(())
            }
            ExprKind::Unary { op, operand } => {
                self.generate_expression(operand)?;
                match op {
                    UnaryOp::Neg => writeln!(&mut self.output, "neg")?,
                    UnaryOp::Not => writeln!(&mut self.output, "not")?,
                }
                Ok(())
            }
            ExprKind::Var { name, .. } => self.push_symbol(name),
            ExprKind::Index { base, index } => {
                self.generate_expression(base)?;
                self.generate_expression(index)?;
                writeln!(&mut self.output, "add")?;
                writeln!(&mut self.output, "pop pointer 1")?;
                writeln!(&mut self.output, "push that 0")?;
                Ok(())
            }
            ExprKind::Call {
                receiver,
                name,
                args,
            } => self.generate_call(receiver.as_deref(), name, args),
        }
    }

    /// `push constant len; call String.new 1` then one `appendChar` per
    /// character, leaving the String object on the stack.
    fn generate_string(&mut self, text: &str) -> Result<(), CodeGenError> {
        writeln!(&mut self.output, "push constant {}", text.len())?;
        writeln!(&mut self.output, "call String.new 1")?;
        for ch in text.chars() {
            writeln!(&mut self.output, "push constant {}", ch as u32)?;
            writeln!(&mut self.output, "call String.appendChar 2")?;
        }
        Ok(())
    }

    fn generate_call(
        &mut self,
        receiver: Option<&Expr>,
        name: &str,
        args: &[Expr],
    ) -> Result<(), CodeGenError> {
        match receiver {
            None => {
                // A call on the current class; methods get the current
                // instance prepended
                let signature = self
                    .registry
                    .signature(&self.class_name, name)
                    .ok_or_else(|| CodeGenError::UnresolvedCall {
                        class: self.class_name.clone(),
                        subroutine: name.to_string(),
                    })?;
                if signature.kind == SubroutineKind::Method {
                    writeln!(&mut self.output, "push pointer 0")?;
                    self.generate_args(args)?;
                    writeln!(
                        &mut self.output,
                        "call {}.{} {}",
                        self.class_name,
                        name,
                        args.len() + 1
                    )?;
                } else {
                    self.generate_args(args)?;
                    writeln!(
                        &mut self.output,
                        "call {}.{} {}",
                        self.class_name,
                        name,
                        args.len()
                    )?;
                }
                Ok(())
            }
            Some(recv) => {
                // Same receiver discrimination as the analyzer: a defined
                // symbol is an instance, any other bare identifier is a
                // class name
                if let ExprKind::Var { name: var, .. } = &recv.kind {
                    if self.table.lookup(var).is_some() {
                        let class = self.receiver_class(recv)?;
                        self.push_symbol(var)?;
                        self.generate_args(args)?;
                        writeln!(
                            &mut self.output,
                            "call {}.{} {}",
                            class,
                            name,
                            args.len() + 1
                        )?;
                    } else {
                        self.generate_args(args)?;
                        writeln!(&mut self.output, "call {}.{} {}", var, name, args.len())?;
                    }
                    return Ok(());
                }
                // General receiver expression: its resolved type supplies
                // the class
                let class = self.receiver_class(recv)?;
                self.generate_expression(recv)?;
                self.generate_args(args)?;
                writeln!(
                    &mut self.output,
                    "call {}.{} {}",
                    class,
                    name,
                    args.len() + 1
                )?;
                Ok(())
            }
        }
    }

    fn generate_args(&mut self, args: &[Expr]) -> Result<(), CodeGenError> {
        for arg in args {
            self.generate_expression(arg)?;
        }
        Ok(())
    }

    fn receiver_class(&self, recv: &Expr) -> Result<String, CodeGenError> {
        recv.resolved_type()
            .map(|ty| ty.base.clone())
            .ok_or(CodeGenError::UntypedReceiver {
                line: recv.span.line,
                column: recv.span.column,
            })
    }
}
