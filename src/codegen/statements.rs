//! Statement lowering.
//!
//! `if` and `while` compile with per-subroutine label counters; labels are
//! pairwise distinct within a subroutine. The array-write pattern parks the
//! computed cell address behind the value in `temp 0` so the value expression
//! may itself use `pointer 1`.

use super::{CodeGen, CodeGenError};
use crate::ast::Statement;
use std::fmt::Write as _;

impl CodeGen<'_> {
    pub(super) fn generate_statements(
        &mut self,
        statements: &[Statement],
    ) -> Result<(), CodeGenError> {
        for stmt in statements {
            self.generate_statement(stmt)?;
        }
        Ok(())
    }

    fn generate_statement(&mut self, stmt: &Statement) -> Result<(), CodeGenError> {
        match stmt {
            Statement::Let {
                name,
                index,
                value,
                ..
            } => match index {
                None => {
                    self.generate_expression(value)?;
                    self.pop_symbol(name)
                }
                Some(index_expr) => {
                    // address = base + index
                    self.push_symbol(name)?;
                    self.generate_expression(index_expr)?;
                    writeln!(&mut self.output, "add")?;
                    // value, then write through `that`
                    self.generate_expression(value)?;
                    writeln!(&mut self.output, "pop temp 0")?;
                    writeln!(&mut self.output, "pop pointer 1")?;
                    writeln!(&mut self.output, "push temp 0")?;
                    writeln!(&mut self.output, "pop that 0")?;
                    Ok(())
                }
            },
            Statement::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                let n = self.if_counter;
                self.if_counter += 1;
                let else_label = format!("IF_ELSE_{}", n);
                let end_label = format!("IF_END_{}", n);

                self.generate_expression(cond)?;
                writeln!(&mut self.output, "not")?;
                writeln!(&mut self.output, "if-goto {}", else_label)?;
                self.generate_statements(then_body)?;
                writeln!(&mut self.output, "goto {}", end_label)?;
                writeln!(&mut self.output, "label {}", else_label)?;
                if let Some(else_body) = else_body {
                    self.generate_statements(else_body)?;
                }
                writeln!(&mut self.output, "label {}", end_label)?;
                Ok(())
            }
            Statement::While { cond, body, .. } => {
                let n = self.while_counter;
                self.while_counter += 1;
                let loop_label = format!("WHILE_LOOP_{}", n);
                let end_label = format!("WHILE_END_{}", n);

                writeln!(&mut self.output, "label {}", loop_label)?;
                self.generate_expression(cond)?;
                writeln!(&mut self.output, "not")?;
                writeln!(&mut self.output, "if-goto {}", end_label)?;
                self.generate_statements(body)?;
                writeln!(&mut self.output, "goto {}", loop_label)?;
                writeln!(&mut self.output, "label {}", end_label)?;
                Ok(())
            }
            Statement::Do { call, .. } => {
                self.generate_expression(call)?;
                // The call left its result (or 0 for void) on the stack
                writeln!(&mut self.output, "pop temp 0")?;
                Ok(())
            }
            Statement::Return { value, .. } => {
                match value {
                    Some(expr) => self.generate_expression(expr)?,
                    // Void subroutines still return a word for the caller
                    // to discard
                    None => writeln!(&mut self.output, "push constant 0")?,
                }
                writeln!(&mut self.output, "return")?;
                Ok(())
            }
        }
    }
}
