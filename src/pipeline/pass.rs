//! The pass abstraction (spec.md §4.9): "a pass is `{name: string,
//! apply(module, function, config)}`." A [`PassRegistry`] runs a fixed
//! ordered list of passes over every function body in a module.

use crate::error::Result;
use crate::ir::{FunctionId, Module};

/// Per-run configuration threaded through every pass. Kept small and
/// additive: a pass that doesn't care about a flag just ignores it, the
/// same way `cranelift-codegen`'s `Flags` object is shared read-only across
/// an entire compilation rather than re-derived per pass.
#[derive(Debug, Clone, Default)]
pub struct PassConfig {
    /// Run [`crate::analysis::verify_use_def`] before the pass, aborting the
    /// pipeline on the first structural-bug error (spec.md §7).
    pub verify_before: bool,
}

/// `{name, apply(module, function, config)}` (spec.md §4.9).
pub trait Pass {
    fn name(&self) -> &str;

    fn apply(&self, module: &mut Module, function: FunctionId, config: &PassConfig) -> Result<()>;
}

/// An ordered list of passes run over every function body in a module, in
/// registration order. There is no pass-dependency solver here: spec.md
/// names only one core pass (DCE), so ordering is the caller's
/// responsibility, not inferred.
#[derive(Default)]
pub struct PassRegistry {
    passes: Vec<Box<dyn Pass>>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn register(&mut self, pass: Box<dyn Pass>) -> &mut Self {
        self.passes.push(pass);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.passes.iter().map(|p| p.name())
    }

    /// Runs every registered pass, in order, over `function`.
    pub fn run_all(&self, module: &mut Module, function: FunctionId, config: &PassConfig) -> Result<()> {
        for pass in &self.passes {
            log::debug!("running pass '{}' on {function:?}", pass.name());
            if config.verify_before {
                Self::verify(module, function)?;
            }
            pass.apply(module, function, config)?;
        }
        Ok(())
    }

    fn verify(module: &Module, function: FunctionId) -> Result<()> {
        let func = module.function(function)?;
        let entry = func.checked_entry_point()?;
        let structure = crate::analysis::CodeStructure::build(&func.code, entry)?;
        let order: Vec<_> = structure.cfg_postorder().iter().rev().copied().collect();
        crate::analysis::verify_use_def(&func.code, &structure, &order)
    }

    /// Runs every registered pass over every function body in `module`, in
    /// `FunctionId` order.
    pub fn run_all_functions(&self, module: &mut Module, config: &PassConfig) -> Result<()> {
        let ids: Vec<FunctionId> = module.functions().map(|(id, _)| id).collect();
        for id in ids {
            self.run_all(module, id, config)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::operand::Operand;
    use crate::ir::opcode::Opcode;
    use crate::ir::{SymbolKind, SymbolScope, SymbolVisibility};

    struct NoopPass;

    impl Pass for NoopPass {
        fn name(&self) -> &str {
            "noop"
        }

        fn apply(&self, _module: &mut Module, _function: FunctionId, _config: &PassConfig) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn registry_runs_passes_in_order() {
        let mut module = Module::new();
        let sym = module
            .declare_symbol("f", SymbolKind::Function, SymbolScope::Export, SymbolVisibility::Default)
            .unwrap();
        let decl = module.declare_function(sym, vec![], None, false).unwrap();
        let func_id = module.new_function(decl).unwrap();
        {
            let func = module.function_mut(func_id).unwrap();
            let entry = func.entry_point;
            func.code.append_instr(entry, Opcode::Return, Operand::None).unwrap();
        }

        let mut registry = PassRegistry::new();
        registry.register(Box::new(NoopPass));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["noop"]);
        registry.run_all_functions(&mut module, &PassConfig::default()).unwrap();
    }
}
