//! Passes over a fully wired [`Graph`].
//!
//! Construction through `Graph::apply` leaves every graph consistent, so a
//! pipeline always starts from a valid arena. Passes that rewrite the arena
//! in place can break that. With rechecking on, the manager re-runs
//! [`ValidatePass`] after each mutating pass, and a broken invariant is
//! reported against the pass that broke it rather than some later consumer.

use tracing::{debug, instrument, warn};

use crate::error::{PassError, PassFailure};
use crate::ir::graph::Graph;
use crate::pass::ValidatePass;

pub trait GraphPass {
    /// Name used in logs and in [`PassFailure`].
    fn name(&self) -> &'static str;

    /// Whether the pass may change the graph. Read-only passes are never
    /// followed by a recheck.
    fn mutates(&self) -> bool {
        true
    }

    fn run(&mut self, graph: &mut Graph) -> Result<(), PassError>;
}

/// Ordered pipeline of graph passes.
#[derive(Default)]
pub struct GraphPassManager {
    passes: Vec<Box<dyn GraphPass>>,
    recheck: bool,
}

impl GraphPassManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager that validates the graph after every mutating pass.
    pub fn with_recheck() -> Self {
        Self {
            passes: Vec::new(),
            recheck: true,
        }
    }

    pub fn set_recheck(&mut self, recheck: bool) {
        self.recheck = recheck;
    }

    pub fn add_pass(&mut self, pass: impl GraphPass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Runs the passes in registration order and stops at the first failure.
    #[instrument(skip_all, fields(graph = %graph.name, passes = self.passes.len()))]
    pub fn run(&mut self, graph: &mut Graph) -> Result<(), PassFailure> {
        for pass in &mut self.passes {
            let name = pass.name();
            let before = (graph.variables().len(), graph.operators().len());
            if let Err(error) = pass.run(graph) {
                warn!(pass = name, %error, "pass failed");
                return Err(PassFailure::Failed { pass: name, error });
            }
            debug!(
                pass = name,
                variables = graph.variables().len(),
                operators = graph.operators().len(),
                variables_before = before.0,
                operators_before = before.1,
                "pass finished"
            );

            if self.recheck && pass.mutates() {
                if let Err(error) = ValidatePass.run(graph) {
                    warn!(pass = name, %error, "graph invariants broken");
                    return Err(PassFailure::BrokeInvariants { pass: name, error });
                }
            }
        }
        Ok(())
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::axis::AxisOrder;
    use crate::ir::operator::Operator;
    use crate::ir::shape::Shape;

    fn relu_chain() -> Graph {
        let mut graph = Graph::new("chain");
        let x = graph
            .add_input("x", Shape::new(AxisOrder::nc(), &[1, 4]).unwrap())
            .unwrap();
        let y = graph.apply_one(Operator::relu("relu").unwrap(), &[x]).unwrap();
        graph.mark_output(y).unwrap();
        graph
    }

    /// Drops the input's consumer links, leaving a one-sided edge.
    struct DropConsumers {
        claims_read_only: bool,
    }

    impl GraphPass for DropConsumers {
        fn name(&self) -> &'static str {
            "drop-consumers"
        }

        fn mutates(&self) -> bool {
            !self.claims_read_only
        }

        fn run(&mut self, graph: &mut Graph) -> Result<(), PassError> {
            graph.variables[0].consumers.clear();
            Ok(())
        }
    }

    #[test]
    fn test_recheck_blames_the_mutating_pass() {
        let mut manager = GraphPassManager::with_recheck();
        manager.add_pass(DropConsumers { claims_read_only: false });
        let failure = manager.run(&mut relu_chain()).unwrap_err();
        assert!(matches!(failure, PassFailure::BrokeInvariants { pass: "drop-consumers", .. }));
        assert!(failure.error().to_string().contains("not among its consumers"), "{}", failure);
    }

    #[test]
    fn test_no_recheck_without_opt_in_or_for_read_only_passes() {
        let mut manager = GraphPassManager::new();
        manager.add_pass(DropConsumers { claims_read_only: false });
        assert!(manager.run(&mut relu_chain()).is_ok());

        let mut manager = GraphPassManager::with_recheck();
        manager.add_pass(DropConsumers { claims_read_only: true });
        assert!(manager.run(&mut relu_chain()).is_ok());

        manager.set_recheck(false);
        manager.add_pass(DropConsumers { claims_read_only: false });
        assert_eq!(manager.pass_names(), vec!["drop-consumers", "drop-consumers"]);
        assert!(manager.run(&mut relu_chain()).is_ok());
    }
}
