//! Hack VM code generation.
//!
//! Lowers one checked class AST to textual VM instructions, using the
//! class's populated symbol table and the global registry. Code generation
//! assumes analysis succeeded: every expression it reads carries a resolved
//! type (statement-level `void` calls excepted), and every subroutine scope
//! can be re-entered through the table's snapshot history.
//!
//! # Module Structure
//!
//! - `statements.rs`: statement lowering and control-flow labels
//! - `expressions.rs`: post-order expression lowering and call dispatch
//! - `error.rs`: error types

mod error;
mod expressions;
mod statements;

pub use error::CodeGenError;

use crate::ast::{Class, SubroutineDec, SubroutineKind};
use crate::registry::GlobalRegistry;
use crate::symbols::{SymbolKind, SymbolTable};
use std::fmt::Write as _;

pub struct CodeGen<'a> {
    registry: &'a GlobalRegistry,
    table: &'a mut SymbolTable,
    class_name: String,
    output: String,
    /// Per-subroutine label counters; reset in `generate_subroutine`
    if_counter: usize,
    while_counter: usize,
}

impl<'a> CodeGen<'a> {
    pub fn new(registry: &'a GlobalRegistry, table: &'a mut SymbolTable) -> Self {
        CodeGen {
            registry,
            table,
            class_name: String::new(),
            output: String::new(),
            if_counter: 0,
            while_counter: 0,
        }
    }

    /// Generate the VM text for one class.
    pub fn generate_class(&mut self, class: &Class) -> Result<String, CodeGenError> {
        self.class_name = class.name.clone();
        for sub in &class.subs {
            self.generate_subroutine(sub)?;
        }
        Ok(std::mem::take(&mut self.output))
    }

    /// Emit `function Class.sub nLocals` plus the kind-specific prologue,
    /// then lower the body.
    fn generate_subroutine(&mut self, sub: &SubroutineDec) -> Result<(), CodeGenError> {
        if !self.table.resume_subroutine(&sub.name) {
            return Err(CodeGenError::ScopeNotAnalyzed {
                class: self.class_name.clone(),
                subroutine: sub.name.clone(),
            });
        }
        self.if_counter = 0;
        self.while_counter = 0;

        let n_locals = self.table.var_count(SymbolKind::Local);
        writeln!(
            &mut self.output,
            "function {}.{} {}",
            self.class_name, sub.name, n_locals
        )?;

        match sub.kind {
            SubroutineKind::Constructor => {
                // Allocate the instance and point `this` at it
                let n_fields = self.table.var_count(SymbolKind::Field);
                writeln!(&mut self.output, "push constant {}", n_fields)?;
                writeln!(&mut self.output, "call Memory.alloc 1")?;
                writeln!(&mut self.output, "pop pointer 0")?;
            }
            SubroutineKind::Method => {
                // The caller passed the instance as argument 0
                writeln!(&mut self.output, "push argument 0")?;
                writeln!(&mut self.output, "pop pointer 0")?;
            }
            SubroutineKind::Function => {}
        }

        self.generate_statements(&sub.body)
    }

    /// Push the value of a named symbol from its segment.
    fn push_symbol(&mut self, name: &str) -> Result<(), CodeGenError> {
        let symbol = self.table.lookup(name).ok_or_else(|| {
            CodeGenError::UnknownSymbol {
                class: self.class_name.clone(),
                name: name.to_string(),
            }
        })?;
        writeln!(
            &mut self.output,
            "push {} {}",
            symbol.kind.segment(),
            symbol.index
        )?;
        Ok(())
    }

    /// Pop the top of stack into a named symbol's segment slot.
    fn pop_symbol(&mut self, name: &str) -> Result<(), CodeGenError> {
        let symbol = self.table.lookup(name).ok_or_else(|| {
            CodeGenError::UnknownSymbol {
                class: self.class_name.clone(),
                name: name.to_string(),
            }
        })?;
        writeln!(
            &mut self.output,
            "pop {} {}",
            symbol.kind.segment(),
            symbol.index
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::register_os_classes;
    use crate::parser::Parser;
    use crate::registry::register_class_decl;
    use crate::typechecker::TypeChecker;
    use std::collections::HashMap;

    /// Run the full pipeline over `source` and return the VM text per class.
    fn generate(source: &str) -> HashMap<String, String> {
        let registry = GlobalRegistry::new();
        register_os_classes(&registry);
        let mut parser = Parser::new(source).expect("lexing failed");
        let classes = parser
            .parse()
            .unwrap_or_else(|errs| panic!("parse failed: {:?}", errs));
        for class in &classes {
            register_class_decl(&registry, class).expect("registration failed");
        }
        let mut output = HashMap::new();
        for class in &classes {
            let mut table = SymbolTable::new();
            TypeChecker::new(&registry, &mut table)
                .check_class(class)
                .unwrap_or_else(|d| panic!("analysis failed: {}", d));
            let vm = CodeGen::new(&registry, &mut table)
                .generate_class(class)
                .unwrap_or_else(|e| panic!("codegen failed: {}", e));
            output.insert(class.name.clone(), vm);
        }
        output
    }

    fn lines(vm: &str) -> Vec<&str> {
        vm.lines().collect()
    }

    #[test]
    fn test_constructor_prologue_and_return_this() {
        let vm = generate(
            "class A { constructor A new() { return this; } }\n\
             class Main { function void main() { var A a; let a = A.new(); return; } }",
        );
        assert_eq!(
            lines(&vm["A"]),
            vec![
                "function A.new 0",
                "push constant 0",
                "call Memory.alloc 1",
                "pop pointer 0",
                "push pointer 0",
                "return",
            ]
        );
    }

    #[test]
    fn test_constructor_allocates_fields() {
        let vm = generate(
            "class Pair {\n\
             field int a, b;\n\
             constructor Pair new() { let a = 0; let b = 0; return this; }\n\
             }\n\
             class Main { function void main() { return; } }",
        );
        let vm = &vm["Pair"];
        assert!(vm.starts_with(
            "function Pair.new 0\npush constant 2\ncall Memory.alloc 1\npop pointer 0\n"
        ));
        // Field writes go through the `this` segment
        assert!(vm.contains("pop this 0"));
        assert!(vm.contains("pop this 1"));
    }

    #[test]
    fn test_arithmetic_lowering() {
        let vm = generate(
            "class Main { function void main() {\n\
             var int x;\n\
             let x = (1 + 2) * 3;\n\
             return;\n\
             } }",
        );
        let vm = &vm["Main"];
        let expected = [
            "push constant 1",
            "push constant 2",
            "add",
            "push constant 3",
            "call Math.multiply 2",
            "pop local 0",
        ];
        let body: Vec<&str> = lines(vm)
            .into_iter()
            .skip(1) // function directive
            .take(expected.len())
            .collect();
        assert_eq!(body, expected);
    }

    #[test]
    fn test_division_lowering() {
        let vm = generate(
            "class Main { function void main() {\n\
             var int x;\n\
             let x = 10 / 2;\n\
             return;\n\
             } }",
        );
        assert!(vm["Main"].contains("call Math.divide 2"));
    }

    #[test]
    fn test_array_write_pattern() {
        let vm = generate(
            "class Main { function void main() {\n\
             var Array a;\n\
             var int i, v;\n\
             let a = Array.new(4);\n\
             let a[i] = v;\n\
             return;\n\
             } }",
        );
        let vm = &vm["Main"];
        let expected = "push local 0\n\
                        push local 1\n\
                        add\n\
                        push local 2\n\
                        pop temp 0\n\
                        pop pointer 1\n\
                        push temp 0\n\
                        pop that 0";
        assert!(vm.contains(expected), "missing array-write pattern in:\n{}", vm);
    }

    #[test]
    fn test_array_read_pattern() {
        let vm = generate(
            "class Main { function void main() {\n\
             var Array a;\n\
             var int v;\n\
             let a = Array.new(4);\n\
             let v = a[3];\n\
             return;\n\
             } }",
        );
        let vm = &vm["Main"];
        let expected = "push local 0\n\
                        push constant 3\n\
                        add\n\
                        pop pointer 1\n\
                        push that 0";
        assert!(vm.contains(expected), "missing array-read pattern in:\n{}", vm);
    }

    #[test]
    fn test_keyword_constants() {
        let vm = generate(
            "class Main { function void main() {\n\
             var boolean b;\n\
             var String s;\n\
             let b = true;\n\
             let b = false;\n\
             let s = null;\n\
             return;\n\
             } }",
        );
        let vm = &vm["Main"];
        assert!(vm.contains("push constant 0\nnot\npop local 0"));
        assert!(vm.contains("push constant 0\npop local 0"));
        assert!(vm.contains("push constant 0\npop local 1"));
    }

    #[test]
    fn test_unary_lowering() {
        let vm = generate(
            "class Main { function void main() {\n\
             var int x;\n\
             var boolean b;\n\
             let x = -x;\n\
             let b = ~(x > 0);\n\
             return;\n\
             } }",
        );
        let vm = &vm["Main"];
        assert!(vm.contains("push local 0\nneg"));
        assert!(vm.contains("gt\nnot"));
    }

    #[test]
    fn test_string_literal_lowering() {
        let vm = generate(
            "class Main { function void main() {\n\
             var String s;\n\
             let s = \"Hi\";\n\
             return;\n\
             } }",
        );
        let vm = &vm["Main"];
        let expected = "push constant 2\n\
                        call String.new 1\n\
                        push constant 72\n\
                        call String.appendChar 2\n\
                        push constant 105\n\
                        call String.appendChar 2";
        assert!(vm.contains(expected), "missing string pattern in:\n{}", vm);
    }

    #[test]
    fn test_do_discards_result() {
        let vm = generate(
            "class Main { function void main() {\n\
             do Output.printInt(3);\n\
             return;\n\
             } }",
        );
        let vm = &vm["Main"];
        assert!(vm.contains("push constant 3\ncall Output.printInt 1\npop temp 0"));
    }

    #[test]
    fn test_void_return_pushes_zero() {
        let vm = generate("class Main { function void main() { return; } }");
        assert_eq!(
            lines(&vm["Main"]),
            vec!["function Main.main 0", "push constant 0", "return"]
        );
    }

    #[test]
    fn test_method_prologue_and_field_access() {
        let vm = generate(
            "class Point {\n\
             field int x;\n\
             constructor Point new() { let x = 0; return this; }\n\
             method int getX() { return x; }\n\
             }\n\
             class Main { function void main() { return; } }",
        );
        let vm = &vm["Point"];
        assert!(vm.contains(
            "function Point.getX 0\npush argument 0\npop pointer 0\npush this 0\nreturn"
        ));
    }

    #[test]
    fn test_method_call_on_variable() {
        let vm = generate(
            "class Point {\n\
             field int x;\n\
             constructor Point new() { let x = 0; return this; }\n\
             method int getX() { return x; }\n\
             }\n\
             class Main { function void main() {\n\
               var Point p;\n\
               var int v;\n\
               let p = Point.new();\n\
               let v = p.getX();\n\
               return;\n\
             } }",
        );
        let vm = &vm["Main"];
        // The instance is pushed before the (empty) argument list
        assert!(vm.contains("push local 0\ncall Point.getX 1\npop local 1"));
    }

    #[test]
    fn test_bare_method_call_pushes_this() {
        let vm = generate(
            "class Counter {\n\
             field int n;\n\
             constructor Counter new() { let n = 0; return this; }\n\
             method void bump() { let n = n + 1; return; }\n\
             method void twice() { do bump(); do bump(); return; }\n\
             }\n\
             class Main { function void main() { return; } }",
        );
        let vm = &vm["Counter"];
        assert!(vm.contains("push pointer 0\ncall Counter.bump 1\npop temp 0"));
    }

    #[test]
    fn test_static_segment() {
        let vm = generate(
            "class Main {\n\
             static int counter;\n\
             function void main() {\n\
               let counter = counter + 1;\n\
               return;\n\
             } }",
        );
        let vm = &vm["Main"];
        assert!(vm.contains("push static 0"));
        assert!(vm.contains("pop static 0"));
    }

    #[test]
    fn test_if_else_labels_pair_up() {
        let vm = generate(
            "class Main { function void main() {\n\
             var int x;\n\
             if (x > 0) { let x = 1; } else { let x = 2; }\n\
             if (x > 1) { let x = 3; }\n\
             return;\n\
             } }",
        );
        let vm = &vm["Main"];
        assert!(vm.contains("if-goto IF_ELSE_0"));
        assert!(vm.contains("label IF_ELSE_0"));
        assert!(vm.contains("goto IF_END_0"));
        assert!(vm.contains("label IF_END_0"));
        assert!(vm.contains("if-goto IF_ELSE_1"));

        // Every if-goto/goto target appears exactly once as a label
        let mut targets: Vec<&str> = Vec::new();
        let mut labels: Vec<&str> = Vec::new();
        for line in vm.lines() {
            if let Some(target) = line
                .strip_prefix("if-goto ")
                .or_else(|| line.strip_prefix("goto "))
            {
                targets.push(target);
            }
            if let Some(label) = line.strip_prefix("label ") {
                labels.push(label);
            }
        }
        for target in &targets {
            assert_eq!(
                labels.iter().filter(|l| l == &target).count(),
                1,
                "target {} not uniquely labeled",
                target
            );
        }
        // Labels are pairwise distinct within the subroutine
        let mut deduped = labels.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), labels.len());
    }

    #[test]
    fn test_while_lowering() {
        let vm = generate(
            "class Main { function void main() {\n\
             var int i;\n\
             let i = 0;\n\
             while (i < 10) { let i = i + 1; }\n\
             return;\n\
             } }",
        );
        let vm = &vm["Main"];
        let expected = "label WHILE_LOOP_0\n\
                        push local 0\n\
                        push constant 10\n\
                        lt\n\
                        not\n\
                        if-goto WHILE_END_0\n\
                        push local 0\n\
                        push constant 1\n\
                        add\n\
                        pop local 0\n\
                        goto WHILE_LOOP_0\n\
                        label WHILE_END_0";
        assert!(vm.contains(expected), "missing while pattern in:\n{}", vm);
    }

    #[test]
    fn test_label_counters_reset_per_subroutine() {
        let vm = generate(
            "class Main {\n\
             function void helper() {\n\
               if (true) { return; }\n\
               return;\n\
             }\n\
             function void main() {\n\
               if (true) { return; }\n\
               return;\n\
             } }",
        );
        let vm = &vm["Main"];
        // Both subroutines start their own counter at zero
        assert_eq!(vm.matches("label IF_END_0").count(), 2);
    }
}
