//! Signatures of the Jack OS classes.
//!
//! The OS sources are never compiled; only their callable surface matters.
//! The driver seeds the global registry with these signatures before the
//! parse phase so user calls into `Math`, `String`, `Array`, `Output`,
//! `Screen`, `Keyboard`, `Memory`, and `Sys` resolve through the ordinary
//! call-resolution path.

use crate::ast::SubroutineKind;
use crate::registry::{GlobalRegistry, MethodSignature};
use crate::types::Type;

struct OsSub {
    name: &'static str,
    kind: SubroutineKind,
    returns: &'static str,
    params: &'static [&'static str],
}

struct OsClass {
    name: &'static str,
    subs: &'static [OsSub],
}

const fn function(name: &'static str, returns: &'static str, params: &'static [&'static str]) -> OsSub {
    OsSub {
        name,
        kind: SubroutineKind::Function,
        returns,
        params,
    }
}

const fn method(name: &'static str, returns: &'static str, params: &'static [&'static str]) -> OsSub {
    OsSub {
        name,
        kind: SubroutineKind::Method,
        returns,
        params,
    }
}

const fn constructor(name: &'static str, returns: &'static str, params: &'static [&'static str]) -> OsSub {
    OsSub {
        name,
        kind: SubroutineKind::Constructor,
        returns,
        params,
    }
}

const OS_API: &[OsClass] = &[
    OsClass {
        name: "Math",
        subs: &[
            function("init", "void", &[]),
            function("abs", "int", &["int"]),
            function("multiply", "int", &["int", "int"]),
            function("divide", "int", &["int", "int"]),
            function("min", "int", &["int", "int"]),
            function("max", "int", &["int", "int"]),
            function("sqrt", "int", &["int"]),
        ],
    },
    OsClass {
        name: "String",
        subs: &[
            constructor("new", "String", &["int"]),
            method("dispose", "void", &[]),
            method("length", "int", &[]),
            method("charAt", "char", &["int"]),
            method("setCharAt", "void", &["int", "char"]),
            method("appendChar", "String", &["char"]),
            method("eraseLastChar", "void", &[]),
            method("intValue", "int", &[]),
            method("setInt", "void", &["int"]),
            function("backSpace", "char", &[]),
            function("doubleQuote", "char", &[]),
            function("newLine", "char", &[]),
        ],
    },
    OsClass {
        name: "Array",
        subs: &[
            function("new", "Array", &["int"]),
            method("dispose", "void", &[]),
        ],
    },
    OsClass {
        name: "Output",
        subs: &[
            function("init", "void", &[]),
            function("moveCursor", "void", &["int", "int"]),
            function("printChar", "void", &["char"]),
            function("printString", "void", &["String"]),
            function("printInt", "void", &["int"]),
            function("println", "void", &[]),
            function("backSpace", "void", &[]),
        ],
    },
    OsClass {
        name: "Screen",
        subs: &[
            function("init", "void", &[]),
            function("clearScreen", "void", &[]),
            function("setColor", "void", &["boolean"]),
            function("drawPixel", "void", &["int", "int"]),
            function("drawLine", "void", &["int", "int", "int", "int"]),
            function("drawRectangle", "void", &["int", "int", "int", "int"]),
            function("drawCircle", "void", &["int", "int", "int"]),
        ],
    },
    OsClass {
        name: "Keyboard",
        subs: &[
            function("init", "void", &[]),
            function("keyPressed", "char", &[]),
            function("readChar", "char", &[]),
            function("readLine", "String", &["String"]),
            function("readInt", "int", &["String"]),
        ],
    },
    OsClass {
        name: "Memory",
        subs: &[
            function("init", "void", &[]),
            function("peek", "int", &["int"]),
            function("poke", "void", &["int", "int"]),
            function("alloc", "Array", &["int"]),
            function("deAlloc", "void", &["Array"]),
        ],
    },
    OsClass {
        name: "Sys",
        subs: &[
            function("init", "void", &[]),
            function("halt", "void", &[]),
            function("error", "void", &["int"]),
            function("wait", "void", &["int"]),
        ],
    },
];

/// Seed the registry with the OS API. Called once, before the parse phase;
/// a user class reusing an OS class name then fails registration like any
/// other duplicate.
pub fn register_os_classes(registry: &GlobalRegistry) {
    for class in OS_API {
        registry.register_class(class.name);
        for sub in class.subs {
            let signature = MethodSignature {
                return_type: Type::new(sub.returns),
                params: sub.params.iter().map(|p| Type::new(*p)).collect(),
                kind: sub.kind,
                line: 0,
                column: 0,
            };
            registry.register_subroutine(class.name, sub.name, signature);
        }
    }
}
