#![forbid(unsafe_code)]

//! Flow-control signals
//!
//! A declaration can abort processing by calling `self.exit(...)` with one of
//! the four signals. Signals unwind through expression evaluation as
//! [`Abort::Signal`] and are caught at the boundary their scope names; they
//! never reach a caller as an error.

use crate::error::EvalError;
use crate::expr::{Args, Function, Module, Value};
use std::fmt;

/// Non-local exit signals, ordered by increasing scope of abort
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FlowControl {
    /// Skip the remaining declarations of the current rule for this match
    Selector,
    /// Skip the remaining rules for the current element
    Element,
    /// Stop the whole run
    Program,
    /// Default argument of `exit()`; behaves as `Program`
    Default,
}

impl FlowControl {
    pub const ALL: [FlowControl; 4] = [
        FlowControl::Default,
        FlowControl::Program,
        FlowControl::Element,
        FlowControl::Selector,
    ];

    /// The name the signal is exposed under in expressions
    pub fn name(self) -> &'static str {
        match self {
            FlowControl::Selector => "SELECTOR",
            FlowControl::Element => "ELEMENT",
            FlowControl::Program => "PROGRAM",
            FlowControl::Default => "DEFAULT",
        }
    }

    /// Whether the signal ends a whole run or selection
    pub fn is_terminal(self) -> bool {
        matches!(self, FlowControl::Program | FlowControl::Default)
    }
}

impl fmt::Display for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spork.{}", self.name())
    }
}

/// Why expression evaluation stopped early
#[derive(Debug, Clone, PartialEq)]
pub enum Abort {
    /// A deliberate flow-control exit
    Signal(FlowControl),
    /// A genuine evaluation failure
    Error(EvalError),
}

impl From<EvalError> for Abort {
    fn from(err: EvalError) -> Self {
        Abort::Error(err)
    }
}

impl From<crate::error::SelectorError> for Abort {
    fn from(err: crate::error::SelectorError) -> Self {
        Abort::Error(err.into())
    }
}

/// Build the module bound to `self` and `Spork` in the global scope
pub fn engine_module() -> Module {
    let mut module = Module::new("Spork");
    for signal in FlowControl::ALL {
        module = module.with(signal.name(), Value::Signal(signal));
    }
    module.with("exit", Value::Function(Function::new("exit", exit)))
}

/// `exit(how=DEFAULT)`: raise `how` if it is a signal, otherwise do nothing
fn exit(args: Args) -> Result<Value, Abort> {
    args.check("exit", 0, 1)?;
    match args.get(0, "how") {
        None => Err(Abort::Signal(FlowControl::Default)),
        Some(Value::Signal(signal)) => Err(Abort::Signal(*signal)),
        Some(_) => Ok(Value::None),
    }
}
