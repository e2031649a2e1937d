//! Semantic analysis for Jack classes.
//!
//! Given the global registry and one class AST, the checker resolves every
//! identifier, verifies types, and populates the class's symbol table. It
//! also writes each expression's resolved type into the AST for the code
//! generator. Unlike the parser, analysis is fatal on the first error.
//!
//! Type compatibility is nominal on the interned base name. `null` unifies
//! with any class type, and `char` and `int` are interchangeable (both are
//! bare 16-bit words at the VM level).

use crate::ast::{
    BinaryOp, Class, ClassVarKind, Expr, ExprKind, KeywordLit, Statement, SubroutineDec,
    SubroutineKind, UnaryOp,
};
use crate::error::Diagnostic;
use crate::registry::{GlobalRegistry, MethodSignature};
use crate::symbols::{SymbolKind, SymbolTable};
use crate::types::{Type, TypeRegistry};
use std::sync::Arc;

impl ClassVarKind {
    fn symbol_kind(self) -> SymbolKind {
        match self {
            ClassVarKind::Static => SymbolKind::Static,
            ClassVarKind::Field => SymbolKind::Field,
        }
    }
}

pub struct TypeChecker<'a> {
    registry: &'a GlobalRegistry,
    table: &'a mut SymbolTable,
    /// Per-unit interning pool; symbols and resolved expression types all
    /// point into it
    types: TypeRegistry,
    class_name: String,
    sub_name: String,
    sub_kind: SubroutineKind,
    return_type: Arc<Type>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(registry: &'a GlobalRegistry, table: &'a mut SymbolTable) -> Self {
        let mut types = TypeRegistry::new();
        let void = types.void();
        TypeChecker {
            registry,
            table,
            types,
            class_name: String::new(),
            sub_name: String::new(),
            sub_kind: SubroutineKind::Function,
            return_type: void,
        }
    }

    /// Analyze one class: class-scope symbols first, then each subroutine.
    pub fn check_class(&mut self, class: &Class) -> Result<(), Diagnostic> {
        self.class_name = class.name.clone();

        for dec in &class.vars {
            let ty = self.intern_checked(&dec.ty, dec.span.line, dec.span.column)?;
            for (name, span) in &dec.names {
                self.table
                    .define(
                        name,
                        Arc::clone(&ty),
                        dec.kind.symbol_kind(),
                        span.line,
                        span.column,
                    )
                    .map_err(|msg| Diagnostic::new(span.line, span.column, msg))?;
            }
        }

        for sub in &class.subs {
            self.check_subroutine(sub)?;
        }
        self.table.finish();
        Ok(())
    }

    fn check_subroutine(&mut self, sub: &SubroutineDec) -> Result<(), Diagnostic> {
        self.table.start_subroutine(&sub.name);
        self.sub_name = sub.name.clone();
        self.sub_kind = sub.kind;
        self.return_type =
            self.intern_checked(&sub.return_type, sub.span.line, sub.span.column)?;

        // Methods receive the instance as implicit argument 0; declared
        // arguments then start at index 1.
        if sub.kind == SubroutineKind::Method {
            let this_ty = self.types.named(&self.class_name);
            self.table
                .define("this", this_ty, SymbolKind::Arg, sub.span.line, sub.span.column)
                .map_err(|msg| Diagnostic::new(sub.span.line, sub.span.column, msg))?;
        }

        for param in &sub.params {
            let ty = self.intern_checked(&param.ty, param.span.line, param.span.column)?;
            self.table
                .define(
                    &param.name,
                    ty,
                    SymbolKind::Arg,
                    param.span.line,
                    param.span.column,
                )
                .map_err(|msg| Diagnostic::new(param.span.line, param.span.column, msg))?;
        }

        for dec in &sub.locals {
            let ty = self.intern_checked(&dec.ty, dec.span.line, dec.span.column)?;
            for (name, span) in &dec.names {
                self.table
                    .define(name, Arc::clone(&ty), SymbolKind::Local, span.line, span.column)
                    .map_err(|msg| Diagnostic::new(span.line, span.column, msg))?;
            }
        }

        self.check_statements(&sub.body)?;

        if !body_returns(&sub.body) {
            return Err(Diagnostic::new(
                sub.span.line,
                sub.span.column,
                format!("missing return in subroutine '{}'", sub.name),
            ));
        }
        Ok(())
    }

    /// Intern a syntactic type after verifying its base name is known.
    fn intern_checked(
        &mut self,
        ty: &Type,
        line: usize,
        column: usize,
    ) -> Result<Arc<Type>, Diagnostic> {
        if !self.registry.class_exists(&ty.base) {
            return Err(Diagnostic::new(
                line,
                column,
                format!("unknown class '{}'", ty.base),
            ));
        }
        Ok(self.types.intern(ty.clone()))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn check_statements(&mut self, statements: &[Statement]) -> Result<(), Diagnostic> {
        for stmt in statements {
            self.check_statement(stmt)?;
        }
        Ok(())
    }

    fn check_statement(&mut self, stmt: &Statement) -> Result<(), Diagnostic> {
        match stmt {
            Statement::Let {
                name,
                name_span,
                index,
                value,
                ..
            } => {
                let target = match self.table.lookup(name) {
                    Some(symbol) => Arc::clone(&symbol.ty),
                    None => {
                        return Err(Diagnostic::new(
                            name_span.line,
                            name_span.column,
                            format!("unknown identifier '{}'", name),
                        ));
                    }
                };
                match index {
                    Some(index_expr) => {
                        // Array cells are untyped words; both the index and
                        // the stored value check as int.
                        if !target.is_array() {
                            return Err(Diagnostic::new(
                                name_span.line,
                                name_span.column,
                                format!(
                                    "'{}' has type {} and cannot be indexed",
                                    name, target
                                ),
                            ));
                        }
                        let index_ty = self.check_expr(index_expr)?;
                        self.require_int(&index_ty, index_expr, "array index")?;
                        let value_ty = self.check_expr(value)?;
                        self.require_int(&value_ty, value, "array element")?;
                    }
                    None => {
                        let value_ty = self.check_expr(value)?;
                        if !self.compatible(&target, &value_ty) {
                            return Err(Diagnostic::new(
                                value.span.line,
                                value.span.column,
                                format!(
                                    "type mismatch in let statement: cannot assign {} to '{}' of type {}",
                                    value_ty, name, target
                                ),
                            ));
                        }
                    }
                }
                Ok(())
            }
            Statement::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                let cond_ty = self.check_expr(cond)?;
                if !cond_ty.is_boolean() {
                    return Err(Diagnostic::new(
                        cond.span.line,
                        cond.span.column,
                        format!("if condition must be boolean, got {}", cond_ty),
                    ));
                }
                self.check_statements(then_body)?;
                if let Some(else_body) = else_body {
                    self.check_statements(else_body)?;
                }
                Ok(())
            }
            Statement::While { cond, body, .. } => {
                let cond_ty = self.check_expr(cond)?;
                if !cond_ty.is_boolean() {
                    return Err(Diagnostic::new(
                        cond.span.line,
                        cond.span.column,
                        format!("while condition must be boolean, got {}", cond_ty),
                    ));
                }
                self.check_statements(body)
            }
            Statement::Do { call, .. } => {
                // The result is discarded; any return type, void included
                self.check_expr(call)?;
                Ok(())
            }
            Statement::Return { value, span } => match value {
                None => {
                    if !self.return_type.is_void() {
                        return Err(Diagnostic::new(
                            span.line,
                            span.column,
                            format!(
                                "subroutine '{}' must return a value of type {}",
                                self.sub_name, self.return_type
                            ),
                        ));
                    }
                    Ok(())
                }
                Some(expr) => {
                    if self.return_type.is_void() {
                        return Err(Diagnostic::new(
                            span.line,
                            span.column,
                            format!(
                                "void subroutine '{}' cannot return a value",
                                self.sub_name
                            ),
                        ));
                    }
                    if self.sub_kind == SubroutineKind::Constructor
                        && !matches!(expr.kind, ExprKind::Keyword(KeywordLit::This))
                    {
                        return Err(Diagnostic::new(
                            expr.span.line,
                            expr.span.column,
                            "a constructor must return 'this'",
                        ));
                    }
                    let value_ty = self.check_expr(expr)?;
                    let expected = Arc::clone(&self.return_type);
                    if !self.compatible(&expected, &value_ty) {
                        return Err(Diagnostic::new(
                            expr.span.line,
                            expr.span.column,
                            format!(
                                "return type mismatch in '{}': expected {}, got {}",
                                self.sub_name, expected, value_ty
                            ),
                        ));
                    }
                    Ok(())
                }
            },
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Resolve an expression's type, record it on the node, and return it.
    fn check_expr(&mut self, expr: &Expr) -> Result<Arc<Type>, Diagnostic> {
        let ty = match &expr.kind {
            ExprKind::Int(_) => self.types.int(),
            ExprKind::Str(_) => self.types.string(),
            ExprKind::Keyword(KeywordLit::True) | ExprKind::Keyword(KeywordLit::False) => {
                self.types.boolean()
            }
            ExprKind::Keyword(KeywordLit::Null) => self.types.null(),
            ExprKind::Keyword(KeywordLit::This) => {
                if self.sub_kind == SubroutineKind::Function {
                    return Err(Diagnostic::new(
                        expr.span.line,
                        expr.span.column,
                        format!("'this' cannot be used in function '{}'", self.sub_name),
                    ));
                }
                self.types.named(&self.class_name)
            }
            ExprKind::Var { name, .. } => match self.table.lookup(name) {
                Some(symbol) => Arc::clone(&symbol.ty),
                None => {
                    return Err(Diagnostic::new(
                        expr.span.line,
                        expr.span.column,
                        format!("unknown identifier '{}'", name),
                    ));
                }
            },
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.check_expr(lhs)?;
                let rhs_ty = self.check_expr(rhs)?;
                if *op == BinaryOp::Eq {
                    if !self.compatible(&lhs_ty, &rhs_ty) {
                        return Err(Diagnostic::new(
                            expr.span.line,
                            expr.span.column,
                            format!(
                                "type mismatch on binary operator '=': {} vs {}",
                                lhs_ty, rhs_ty
                            ),
                        ));
                    }
                    self.types.boolean()
                } else {
                    // Arithmetic, bitwise, and ordering operators all work
                    // on int operands
                    if !is_word(&lhs_ty) || !is_word(&rhs_ty) {
                        return Err(Diagnostic::new(
                            expr.span.line,
                            expr.span.column,
                            format!(
                                "type mismatch on binary operator '{}': {} vs {}",
                                op.symbol(),
                                lhs_ty,
                                rhs_ty
                            ),
                        ));
                    }
                    if op.is_comparison() {
                        self.types.boolean()
                    } else {
                        self.types.int()
                    }
                }
            }
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.check_expr(operand)?;
                match op {
                    UnaryOp::Neg => {
                        self.require_int(&operand_ty, operand, "operand of unary '-'")?;
                        self.types.int()
                    }
                    UnaryOp::Not => {
                        // `~` flips int bitwise and boolean logically
                        if operand_ty.is_boolean() {
                            self.types.boolean()
                        } else if is_word(&operand_ty) {
                            self.types.int()
                        } else {
                            return Err(Diagnostic::new(
                                operand.span.line,
                                operand.span.column,
                                format!(
                                    "operand of unary '~' must be int or boolean, got {}",
                                    operand_ty
                                ),
                            ));
                        }
                    }
                }
            }
            ExprKind::Index { base, index } => {
                let base_ty = self.check_expr(base)?;
                if !base_ty.is_array() {
                    return Err(Diagnostic::new(
                        base.span.line,
                        base.span.column,
                        format!("expression of type {} cannot be indexed", base_ty),
                    ));
                }
                let index_ty = self.check_expr(index)?;
                self.require_int(&index_ty, index, "array index")?;
                self.types.int()
            }
            ExprKind::Call {
                receiver,
                name,
                args,
            } => self.check_call(expr, receiver.as_deref(), name, args)?,
        };
        expr.resolve(Arc::clone(&ty));
        Ok(ty)
    }

    /// Resolve a call to a signature per the receiver shape, then check the
    /// arguments against it.
    fn check_call(
        &mut self,
        call: &Expr,
        receiver: Option<&Expr>,
        name: &str,
        args: &[Expr],
    ) -> Result<Arc<Type>, Diagnostic> {
        let (class, signature) = match receiver {
            // Bare call: a function/constructor of the current class, or a
            // method on the implicit `this` inside a method body
            None => {
                let class = self.class_name.clone();
                let signature = self.signature_or_err(&class, name, call)?;
                if signature.kind == SubroutineKind::Method
                    && self.sub_kind != SubroutineKind::Method
                {
                    return Err(Diagnostic::new(
                        call.span.line,
                        call.span.column,
                        format!(
                            "method '{}' needs an instance; '{}' is a {}",
                            name,
                            self.sub_name,
                            self.sub_kind.as_str()
                        ),
                    ));
                }
                (class, signature)
            }
            Some(recv) => {
                // A bare identifier receiver is a variable if defined, and a
                // class name otherwise
                let var_class = match &recv.kind {
                    ExprKind::Var { name: var, .. } => {
                        self.table.lookup(var).map(|s| Arc::clone(&s.ty))
                    }
                    _ => None,
                };
                match (&recv.kind, var_class) {
                    (ExprKind::Var { .. }, Some(recv_ty)) => {
                        self.check_instance_receiver(recv, &recv_ty, name, call)?
                    }
                    (ExprKind::Var { name: class, .. }, None) => {
                        if !self.registry.class_exists(class) {
                            return Err(Diagnostic::new(
                                recv.span.line,
                                recv.span.column,
                                format!("unknown class '{}'", class),
                            ));
                        }
                        let signature = self.signature_or_err(class, name, call)?;
                        if signature.kind == SubroutineKind::Method {
                            return Err(Diagnostic::new(
                                call.span.line,
                                call.span.column,
                                format!(
                                    "'{}.{}' is a method and needs an instance",
                                    class, name
                                ),
                            ));
                        }
                        (class.clone(), signature)
                    }
                    _ => {
                        // Any other receiver expression supplies the class
                        // through its resolved type
                        let recv_ty = self.check_expr(recv)?;
                        self.check_instance_receiver_resolved(recv, &recv_ty, name, call)?
                    }
                }
            }
        };

        if args.len() != signature.params.len() {
            return Err(Diagnostic::new(
                call.span.line,
                call.span.column,
                format!(
                    "wrong number of arguments to '{}.{}': expected {}, got {}",
                    class,
                    name,
                    signature.params.len(),
                    args.len()
                ),
            ));
        }
        for (i, (arg, param)) in args.iter().zip(&signature.params).enumerate() {
            let arg_ty = self.check_expr(arg)?;
            let param_ty = self.types.intern(param.clone());
            if !self.compatible(&param_ty, &arg_ty) {
                return Err(Diagnostic::new(
                    arg.span.line,
                    arg.span.column,
                    format!(
                        "type mismatch for argument {} of '{}.{}': expected {}, got {}",
                        i + 1,
                        class,
                        name,
                        param_ty,
                        arg_ty
                    ),
                ));
            }
        }

        Ok(self.types.intern(signature.return_type.clone()))
    }

    /// Instance receiver that is a plain variable: resolve its type here so
    /// the slot is written exactly once.
    fn check_instance_receiver(
        &mut self,
        recv: &Expr,
        recv_ty: &Arc<Type>,
        name: &str,
        call: &Expr,
    ) -> Result<(String, MethodSignature), Diagnostic> {
        recv.resolve(Arc::clone(recv_ty));
        self.check_instance_receiver_resolved(recv, recv_ty, name, call)
    }

    fn check_instance_receiver_resolved(
        &mut self,
        recv: &Expr,
        recv_ty: &Arc<Type>,
        name: &str,
        call: &Expr,
    ) -> Result<(String, MethodSignature), Diagnostic> {
        if !recv_ty.is_class() {
            return Err(Diagnostic::new(
                recv.span.line,
                recv.span.column,
                format!("cannot call a method on a value of type {}", recv_ty),
            ));
        }
        let class = recv_ty.base.clone();
        let signature = self.signature_or_err(&class, name, call)?;
        if signature.kind != SubroutineKind::Method {
            return Err(Diagnostic::new(
                call.span.line,
                call.span.column,
                format!(
                    "'{}.{}' is a {} and cannot be called on an instance",
                    class,
                    name,
                    signature.kind.as_str()
                ),
            ));
        }
        Ok((class, signature))
    }

    fn signature_or_err(
        &self,
        class: &str,
        name: &str,
        call: &Expr,
    ) -> Result<MethodSignature, Diagnostic> {
        self.registry.signature(class, name).ok_or_else(|| {
            Diagnostic::new(
                call.span.line,
                call.span.column,
                format!("unknown subroutine '{}' in class '{}'", name, class),
            )
        })
    }

    // =========================================================================
    // Type relations
    // =========================================================================

    fn require_int(
        &self,
        ty: &Arc<Type>,
        expr: &Expr,
        what: &str,
    ) -> Result<(), Diagnostic> {
        if is_word(ty) {
            Ok(())
        } else {
            Err(Diagnostic::new(
                expr.span.line,
                expr.span.column,
                format!("{} must be int, got {}", what, ty),
            ))
        }
    }

    /// Nominal compatibility on the base name, with two carve-outs: `null`
    /// unifies with any class type, and `char`/`int` are interchangeable.
    fn compatible(&self, expected: &Arc<Type>, actual: &Arc<Type>) -> bool {
        if Arc::ptr_eq(expected, actual) || expected.base == actual.base {
            return true;
        }
        if expected.is_class() && actual.is_null() {
            return true;
        }
        if actual.is_class() && expected.is_null() {
            return true;
        }
        (expected.is_int() && actual.is_char()) || (expected.is_char() && actual.is_int())
    }
}

/// `char` values are 16-bit words and check wherever an int is required.
fn is_word(ty: &Type) -> bool {
    ty.is_int() || ty.is_char()
}

/// A statement list returns when its last statement is a `return`, or an
/// `if`/`else` whose branches both return.
fn body_returns(statements: &[Statement]) -> bool {
    match statements.last() {
        Some(Statement::Return { .. }) => true,
        Some(Statement::If {
            then_body,
            else_body: Some(else_body),
            ..
        }) => body_returns(then_body) && body_returns(else_body),
        _ => false,
    }
}

/// Verify the program entry point: `Main.main` must exist, be a function,
/// and return `void`. Run by the driver once every class is registered.
pub fn check_main_entry(registry: &GlobalRegistry) -> Result<(), Diagnostic> {
    let Some(signature) = registry.signature("Main", "main") else {
        return Err(Diagnostic::new(
            1,
            1,
            "class 'Main' must declare a 'main' function",
        ));
    };
    if signature.kind != SubroutineKind::Function {
        return Err(Diagnostic::new(
            signature.line,
            signature.column,
            format!(
                "'Main.main' must be a function, not a {}",
                signature.kind.as_str()
            ),
        ));
    }
    if !signature.return_type.is_void() {
        return Err(Diagnostic::new(
            signature.line,
            signature.column,
            format!(
                "'Main.main' must return void, not {}",
                signature.return_type
            ),
        ));
    }
    Ok(())
}
