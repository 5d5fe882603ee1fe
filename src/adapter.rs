//! Wiring decorated calls into a calling framework.
//!
//! A calling framework asks each registered [`CallAdapterFactory`] in turn for an adapter
//! matching a method's declared return type. [`CircuitBreakerCallAdapterFactory`] claims every
//! `Call<Foo>` and adapts the framework's calls into [`DecoratedCall`]s.

use std::fmt::{self, Display};

use super::call::Call;
use super::circuit_breaker::CircuitBreaker;
use super::decorated_call::{decorate_call, DecoratedCall};
use super::error::InvalidDeclaration;
use super::success_predicate::IsSuccessful;

/// The raw type name of the calling framework's call abstraction.
pub const CALL_TYPE: &str = "Call";

/// A declared type, as seen by a calling framework.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// A named type with its type arguments, e.g. `Call<String>`.
    Named {
        /// The raw type name.
        name: String,
        /// The type arguments, empty for a raw type.
        arguments: Vec<TypeDescriptor>,
    },
    /// A wildcard with an upper bound, i.e. `? extends Foo`.
    Wildcard {
        /// The wildcard's upper bound.
        upper_bound: Box<TypeDescriptor>,
    },
}

impl TypeDescriptor {
    /// A type without type arguments.
    pub fn raw(name: impl Into<String>) -> Self {
        TypeDescriptor::Named {
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    /// A type with type arguments.
    pub fn parameterized(name: impl Into<String>, arguments: Vec<TypeDescriptor>) -> Self {
        TypeDescriptor::Named {
            name: name.into(),
            arguments,
        }
    }

    /// A `? extends upper_bound` wildcard.
    pub fn extends(upper_bound: TypeDescriptor) -> Self {
        TypeDescriptor::Wildcard {
            upper_bound: Box::new(upper_bound),
        }
    }

    /// `Call<payload>`.
    pub fn call_of(payload: TypeDescriptor) -> Self {
        TypeDescriptor::parameterized(CALL_TYPE, vec![payload])
    }

    /// The raw type name; `None` for wildcards.
    pub fn raw_name(&self) -> Option<&str> {
        match self {
            TypeDescriptor::Named { name, .. } => Some(name.as_str()),
            TypeDescriptor::Wildcard { .. } => None,
        }
    }

    /// The type arguments; empty for raw types and wildcards.
    pub fn arguments(&self) -> &[TypeDescriptor] {
        match self {
            TypeDescriptor::Named { arguments, .. } => arguments.as_slice(),
            TypeDescriptor::Wildcard { .. } => &[],
        }
    }

    /// Returns the type itself, or the upper bound of a wildcard.
    pub fn upper_bound(&self) -> &TypeDescriptor {
        match self {
            TypeDescriptor::Wildcard { upper_bound } => upper_bound.upper_bound(),
            named => named,
        }
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeDescriptor::Named { name, arguments } => {
                write!(f, "{}", name)?;
                if let Some((first, rest)) = arguments.split_first() {
                    write!(f, "<{}", first)?;
                    for argument in rest {
                        write!(f, ", {}", argument)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeDescriptor::Wildcard { upper_bound } => write!(f, "? extends {}", upper_bound),
        }
    }
}

/// An opaque method annotation handed to factories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Annotation(pub String);

/// Adapts a calling framework's calls of one declared return type.
pub trait CallAdapter {
    /// The call handed back to the framework in place of the original one.
    type Adapted<C: Call>: Call<Body = C::Body, Request = C::Request>;

    /// The declared success payload type, used by the framework to deserialize bodies.
    fn response_type(&self) -> &TypeDescriptor;

    /// Adapts `call`.
    fn adapt<C: Call>(&self, call: C) -> Self::Adapted<C>;
}

/// Creates adapters for declared return types.
///
/// `CTX` is the calling framework's own handle, passed through untouched so that a factory may
/// look up further framework configuration.
pub trait CallAdapterFactory<CTX: ?Sized = ()> {
    /// The adapter created by this factory.
    type Adapter: CallAdapter;

    /// Returns an adapter for `return_type`, or `None` to let another factory handle it.
    fn get(
        &self,
        return_type: &TypeDescriptor,
        annotations: &[Annotation],
        context: &CTX,
    ) -> Result<Option<Self::Adapter>, InvalidDeclaration>;
}

/// Creates [`CircuitBreakerCallAdapter`]s sharing one circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerCallAdapterFactory<B> {
    breaker: B,
}

impl<B> CircuitBreakerCallAdapterFactory<B>
where
    B: CircuitBreaker + Clone,
{
    /// Creates a factory whose adapters report to `breaker`.
    pub fn new(breaker: B) -> Self {
        CircuitBreakerCallAdapterFactory { breaker }
    }
}

impl<B, CTX> CallAdapterFactory<CTX> for CircuitBreakerCallAdapterFactory<B>
where
    B: CircuitBreaker + Clone,
    CTX: ?Sized,
{
    type Adapter = CircuitBreakerCallAdapter<B>;

    fn get(
        &self,
        return_type: &TypeDescriptor,
        _annotations: &[Annotation],
        _context: &CTX,
    ) -> Result<Option<CircuitBreakerCallAdapter<B>>, InvalidDeclaration> {
        if return_type.raw_name() != Some(CALL_TYPE) {
            return Ok(None);
        }

        let response_type = match return_type.arguments() {
            [payload] => payload.upper_bound().clone(),
            _ => return Err(InvalidDeclaration::new(return_type.to_string())),
        };

        Ok(Some(CircuitBreakerCallAdapter {
            response_type,
            breaker: self.breaker.clone(),
        }))
    }
}

/// Decorates calls of one declared return type with the factory's breaker and the 2xx success
/// predicate.
#[derive(Debug, Clone)]
pub struct CircuitBreakerCallAdapter<B> {
    response_type: TypeDescriptor,
    breaker: B,
}

impl<B> CallAdapter for CircuitBreakerCallAdapter<B>
where
    B: CircuitBreaker + Clone,
{
    type Adapted<C: Call> = DecoratedCall<C, B, IsSuccessful>;

    fn response_type(&self) -> &TypeDescriptor {
        &self.response_type
    }

    fn adapt<C: Call>(&self, call: C) -> DecoratedCall<C, B, IsSuccessful> {
        decorate_call(self.breaker.clone(), call)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::super::call::FnCall;
    use super::super::config::Config;
    use super::super::response::Response;
    use super::*;

    #[test]
    fn declines_other_types() {
        let factory = new_factory();
        let declared = TypeDescriptor::parameterized("Future", vec![TypeDescriptor::raw("String")]);

        assert!(factory.get(&declared, &[], &()).unwrap().is_none());
        assert!(factory
            .get(&TypeDescriptor::extends(TypeDescriptor::raw(CALL_TYPE)), &[], &())
            .unwrap()
            .is_none());
    }

    #[test]
    fn extracts_response_type() {
        let factory = new_factory();
        let declared = TypeDescriptor::call_of(TypeDescriptor::raw("String"));

        let adapter = factory.get(&declared, &[], &()).unwrap().unwrap();
        assert_eq!(&TypeDescriptor::raw("String"), adapter.response_type());
    }

    #[test]
    fn extracts_wildcard_upper_bound() {
        let factory = new_factory();
        let payload = TypeDescriptor::parameterized("List", vec![TypeDescriptor::raw("User")]);
        let declared = TypeDescriptor::call_of(TypeDescriptor::extends(payload.clone()));

        let adapter = factory
            .get(&declared, &[Annotation("GET".to_owned())], &())
            .unwrap()
            .unwrap();
        assert_eq!(&payload, adapter.response_type());
    }

    #[test]
    fn raw_call_is_invalid() {
        let factory = new_factory();

        let err = factory.get(&TypeDescriptor::raw(CALL_TYPE), &[], &()).unwrap_err();
        assert_eq!("Call", err.declared());
        assert_eq!(
            "Call return type must be parameterized as Call<Foo> or Call<? extends Foo>, got Call",
            err.to_string()
        );

        let declared = TypeDescriptor::parameterized(
            CALL_TYPE,
            vec![TypeDescriptor::raw("String"), TypeDescriptor::raw("Integer")],
        );
        assert_eq!(
            "Call<String, Integer>",
            factory.get(&declared, &[], &()).unwrap_err().declared()
        );
    }

    #[test]
    fn adapted_calls_share_breaker() {
        let breaker = Config::new().build("backend");
        let factory = CircuitBreakerCallAdapterFactory::new(breaker.clone());
        let adapter = factory
            .get(&TypeDescriptor::call_of(TypeDescriptor::raw("String")), &[], &())
            .unwrap()
            .unwrap();

        for _ in 0..2 {
            let call = adapter.adapt(FnCall::new((), |_: &()| {
                Ok::<_, io::Error>(Response::ok("hello world".to_owned()))
            }));
            assert_eq!("hello world", call.execute().unwrap().into_body());
        }
        assert_eq!(2, breaker.metrics().successful_calls());
    }

    #[test]
    fn display() {
        let map = TypeDescriptor::parameterized(
            "Map",
            vec![TypeDescriptor::raw("String"), TypeDescriptor::raw("User")],
        );
        let declared = TypeDescriptor::call_of(TypeDescriptor::extends(map));
        assert_eq!("Call<? extends Map<String, User>>", declared.to_string());
    }

    fn new_factory() -> CircuitBreakerCallAdapterFactory<crate::StateMachine<()>> {
        CircuitBreakerCallAdapterFactory::new(Config::new().build("backend"))
    }
}
