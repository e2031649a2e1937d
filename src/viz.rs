//! JSON dumps for external visualizers.
//!
//! `--viz-ast` writes `X.ast.json` and `--viz-checker` writes `X.sym.json`
//! next to each input. The dumps are advisory output for viewers; they are
//! written after a successful analyze phase and never affect compilation.

use crate::ast::{Class, Expr, ExprKind, Statement};
use crate::symbols::{Symbol, SymbolTable};
use serde::Serialize;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

pub fn ast_dump_path(input: &Path) -> PathBuf {
    input.with_extension("ast.json")
}

pub fn checker_dump_path(input: &Path) -> PathBuf {
    input.with_extension("sym.json")
}

/// Structural rendering of every class in the unit.
pub fn write_ast_dump(input: &Path, classes: &[Class]) -> std::io::Result<()> {
    let doc = Value::Array(classes.iter().map(class_json).collect());
    let text = serde_json::to_string_pretty(&doc)?;
    std::fs::write(ast_dump_path(input), text)
}

fn class_json(class: &Class) -> Value {
    json!({
        "kind": "class",
        "name": class.name,
        "line": class.span.line,
        "vars": class.vars.iter().map(|dec| json!({
            "kind": match dec.kind {
                crate::ast::ClassVarKind::Static => "static",
                crate::ast::ClassVarKind::Field => "field",
            },
            "type": dec.ty.to_string(),
            "names": dec.names.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(),
            "line": dec.span.line,
        })).collect::<Vec<_>>(),
        "subroutines": class.subs.iter().map(|sub| json!({
            "kind": sub.kind.as_str(),
            "name": sub.name,
            "returns": sub.return_type.to_string(),
            "params": sub.params.iter().map(|p| json!({
                "type": p.ty.to_string(),
                "name": p.name,
            })).collect::<Vec<_>>(),
            "locals": sub.locals.iter().map(|dec| json!({
                "type": dec.ty.to_string(),
                "names": dec.names.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(),
            })).collect::<Vec<_>>(),
            "body": sub.body.iter().map(stmt_json).collect::<Vec<_>>(),
            "line": sub.span.line,
        })).collect::<Vec<_>>(),
    })
}

fn stmt_json(stmt: &Statement) -> Value {
    match stmt {
        Statement::Let {
            name, index, value, ..
        } => json!({
            "stmt": "let",
            "target": name,
            "index": index.as_ref().map(expr_json),
            "value": expr_json(value),
        }),
        Statement::If {
            cond,
            then_body,
            else_body,
            ..
        } => json!({
            "stmt": "if",
            "cond": expr_json(cond),
            "then": then_body.iter().map(stmt_json).collect::<Vec<_>>(),
            "else": else_body.as_ref().map(|b| b.iter().map(stmt_json).collect::<Vec<_>>()),
        }),
        Statement::While { cond, body, .. } => json!({
            "stmt": "while",
            "cond": expr_json(cond),
            "body": body.iter().map(stmt_json).collect::<Vec<_>>(),
        }),
        Statement::Do { call, .. } => json!({
            "stmt": "do",
            "call": expr_json(call),
        }),
        Statement::Return { value, .. } => json!({
            "stmt": "return",
            "value": value.as_ref().map(expr_json),
        }),
    }
}

fn expr_json(expr: &Expr) -> Value {
    let mut node = match &expr.kind {
        ExprKind::Int(n) => json!({ "expr": "int", "value": n }),
        ExprKind::Str(s) => json!({ "expr": "string", "value": s }),
        ExprKind::Keyword(lit) => json!({ "expr": "keyword", "value": format!("{:?}", lit).to_lowercase() }),
        ExprKind::Binary { op, lhs, rhs } => json!({
            "expr": "binary",
            "op": op.symbol().to_string(),
            "lhs": expr_json(lhs),
            "rhs": expr_json(rhs),
        }),
        ExprKind::Unary { op, operand } => json!({
            "expr": "unary",
            "op": match op {
                crate::ast::UnaryOp::Neg => "-",
                crate::ast::UnaryOp::Not => "~",
            },
            "operand": expr_json(operand),
        }),
        ExprKind::Var { name, generics } => json!({
            "expr": "var",
            "name": name,
            "generics": generics.iter().map(|g| g.to_string()).collect::<Vec<_>>(),
        }),
        ExprKind::Index { base, index } => json!({
            "expr": "index",
            "base": expr_json(base),
            "index": expr_json(index),
        }),
        ExprKind::Call {
            receiver,
            name,
            args,
        } => json!({
            "expr": "call",
            "receiver": receiver.as_ref().map(|r| expr_json(r)),
            "name": name,
            "args": args.iter().map(expr_json).collect::<Vec<_>>(),
        }),
    };
    if let Some(ty) = expr.resolved_type()
        && let Some(obj) = node.as_object_mut()
    {
        obj.insert("type".to_string(), Value::String(ty.to_string()));
    }
    node
}

#[derive(Serialize)]
struct SymbolDump {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    kind: &'static str,
    index: u16,
    line: usize,
    column: usize,
}

#[derive(Serialize)]
struct ScopeDump {
    name: String,
    symbols: Vec<SymbolDump>,
}

#[derive(Serialize)]
struct TableDump {
    class: String,
    class_scope: Vec<SymbolDump>,
    subroutines: Vec<ScopeDump>,
}

fn symbol_dumps(symbols: impl Iterator<Item = (String, Symbol)>) -> Vec<SymbolDump> {
    let mut dumps: Vec<SymbolDump> = symbols
        .map(|(name, s)| SymbolDump {
            name,
            ty: s.ty.to_string(),
            kind: s.kind.as_str(),
            index: s.index,
            line: s.line,
            column: s.column,
        })
        .collect();
    // Stable output: order by kind then index
    dumps.sort_by(|a, b| (a.kind, a.index).cmp(&(b.kind, b.index)));
    dumps
}

/// Class scope plus one entry per analyzed subroutine, for every class in
/// the unit.
pub fn write_checker_dump(
    input: &Path,
    classes: &[Class],
    tables: &[SymbolTable],
) -> std::io::Result<()> {
    let dumps: Vec<TableDump> = classes
        .iter()
        .zip(tables)
        .map(|(class, table)| TableDump {
            class: class.name.clone(),
            class_scope: symbol_dumps(
                table
                    .class_scope()
                    .iter()
                    .map(|(n, s)| (n.clone(), s.clone())),
            ),
            subroutines: table
                .history()
                .iter()
                .map(|snap| ScopeDump {
                    name: snap.name.clone(),
                    symbols: symbol_dumps(
                        snap.symbols.iter().map(|(n, s)| (n.clone(), s.clone())),
                    ),
                })
                .collect(),
        })
        .collect();
    let text = serde_json::to_string_pretty(&dumps)?;
    std::fs::write(checker_dump_path(input), text)
}
