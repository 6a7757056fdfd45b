//! Callback adapters --
//!
//! A script function assigned to a callback-typed host member crosses the
//! boundary as a [`CallbackHandle`]: the host invokes it with host values,
//! the adapter translates them into the script world, runs the function in
//! the memory space it was captured in, and hands the result back as a host
//! value.

use std::fmt;
use std::rc::Rc;

use crate::host::HostValue;
use crate::runtime::RuntimeError;
use crate::runtime::interpreter::Interpreter;
use crate::runtime::value::MemorySpaceRef;
use crate::semantic::scope::Callable;

/// What every adapter shape carries: the interpreter, the callable, and the
/// memory space enclosing the function at capture time.
#[derive(Clone)]
struct AdapterCore {
    interpreter: Interpreter,
    callable: Callable,
    parent_space: MemorySpaceRef,
}

/// A script function adapted to one of the supported functional shapes.
pub enum CallbackAdapter {
    /// One argument, no result.
    Consumer(AdapterCore),
    /// Three arguments, no result.
    TriConsumer(AdapterCore),
    /// One argument, one result.
    Function(AdapterCore),
    /// Two arguments, one result.
    BiFunction(AdapterCore),
}

impl CallbackAdapter {
    fn core(&self) -> &AdapterCore {
        match self {
            CallbackAdapter::Consumer(core)
            | CallbackAdapter::TriConsumer(core)
            | CallbackAdapter::Function(core)
            | CallbackAdapter::BiFunction(core) => core,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            CallbackAdapter::Consumer(_) | CallbackAdapter::Function(_) => 1,
            CallbackAdapter::BiFunction(_) => 2,
            CallbackAdapter::TriConsumer(_) => 3,
        }
    }

    pub fn returns_value(&self) -> bool {
        matches!(self, CallbackAdapter::Function(_) | CallbackAdapter::BiFunction(_))
    }

    /// Run the adapted function with host-side arguments.
    ///
    /// # Errors
    /// Arity mismatches, untranslatable arguments, and any error the function
    /// body raises.
    pub fn invoke(&self, args: &[HostValue]) -> Result<HostValue, RuntimeError> {
        let core = self.core();
        if args.len() != self.arity() {
            return Err(RuntimeError::ArityMismatch {
                name: core.callable.name().to_string(),
                expected: self.arity(),
                got: args.len(),
            });
        }
        let env = core.interpreter.environment().clone();
        let values = args
            .iter()
            .map(|arg| env.translate_runtime_object(arg))
            .collect::<Result<Vec<_>, _>>()?;

        // The function runs against the space it was captured in, not
        // whatever space the interpreter happens to be in when the host
        // fires the callback.
        core.interpreter.push_space(core.parent_space.clone());
        let result = core
            .interpreter
            .call_function_with_values(&core.callable, values);
        core.interpreter.pop_space();
        let result = result?;

        if self.returns_value() {
            core.interpreter.instantiate(&result)
        } else {
            Ok(HostValue::None)
        }
    }
}

/// Cloneable shared handle to an adapted script function.
#[derive(Clone)]
pub struct CallbackHandle(Rc<CallbackAdapter>);

impl CallbackHandle {
    pub fn arity(&self) -> usize {
        self.0.arity()
    }

    /// See [`CallbackAdapter::invoke`].
    ///
    /// # Errors
    /// Propagates adapter invocation errors.
    pub fn invoke(&self, args: &[HostValue]) -> Result<HostValue, RuntimeError> {
        self.0.invoke(args)
    }
}

impl fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallbackHandle(arity {})", self.arity())
    }
}

/// Pick the adapter shape matching the callable's signature.
///
/// # Errors
/// [`RuntimeError::AdapterShape`] when no shape fits.
pub fn build_adapter(
    interpreter: &Interpreter,
    callable: &Callable,
    parent: &MemorySpaceRef,
) -> Result<CallbackHandle, RuntimeError> {
    let ty = callable.function_type();
    let returns = !ty.ret.is_none_type();
    let core = AdapterCore {
        interpreter: interpreter.clone(),
        callable: callable.clone(),
        parent_space: parent.clone(),
    };
    let adapter = match (ty.params.len(), returns) {
        (1, false) => CallbackAdapter::Consumer(core),
        (3, false) => CallbackAdapter::TriConsumer(core),
        (1, true) => CallbackAdapter::Function(core),
        (2, true) => CallbackAdapter::BiFunction(core),
        (params, returns) => {
            return Err(RuntimeError::AdapterShape {
                params,
                kind: if returns { "returning" } else { "void" },
            });
        },
    };
    Ok(CallbackHandle(Rc::new(adapter)))
}
