//! Ordered fallback lookups.
//!
//! Query, answer and citation fields are each read from the first of several
//! places that yields something. A [`ResolverChain`] keeps those places as an
//! explicit, named list so the order can be inspected and tested on its own.

use crate::events::{self, PipelineEvent};

type ResolverFn<'r, I> = Box<dyn Fn(&I) -> Option<String> + 'r>;

/// A value together with the resolver that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub source: &'static str,
    pub value: String,
}

/// Named candidate lookups, evaluated in order until one yields a value.
///
/// Values are trimmed and empty results count as "nothing found".
///
/// # Example
///
/// ```rust
/// use tanapaste_core::resolve::ResolverChain;
///
/// let chain = ResolverChain::new("greeting")
///     .then("env", |_: &()| None)
///     .then("blank", |_| Some("   ".to_string()))
///     .then("fallback", |_| Some(" hello ".to_string()));
///
/// let resolved = chain.resolve(&()).unwrap();
/// assert_eq!(resolved.source, "fallback");
/// assert_eq!(resolved.value, "hello");
/// ```
pub struct ResolverChain<'r, I: ?Sized> {
    field: &'static str,
    resolvers: Vec<(&'static str, ResolverFn<'r, I>)>,
}

impl<'r, I: ?Sized> ResolverChain<'r, I> {
    /// Creates an empty chain for the named field.
    pub fn new(field: &'static str) -> Self {
        Self { field, resolvers: Vec::new() }
    }

    /// Appends a resolver.
    pub fn then(mut self, name: &'static str, resolver: impl Fn(&I) -> Option<String> + 'r) -> Self {
        self.resolvers.push((name, Box::new(resolver)));
        self
    }

    /// Resolver names in evaluation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|(name, _)| *name).collect()
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Returns the first non-empty value.
    pub fn resolve(&self, input: &I) -> Option<Resolved> {
        self.resolve_where(input, |_| true)
    }

    /// Returns the first non-empty value that `accept` also agrees to.
    ///
    /// Rejected values fall through to the next resolver.
    pub fn resolve_where(&self, input: &I, accept: impl Fn(&str) -> bool) -> Option<Resolved> {
        let found = self.resolvers.iter().find_map(|(name, resolver)| {
            let value = resolver(input)?;
            let value = value.trim();
            (!value.is_empty() && accept(value)).then(|| Resolved { source: *name, value: value.to_string() })
        });

        match &found {
            Some(resolved) => events::emit(PipelineEvent::Resolved { field: self.field, source: resolved.source }),
            None => events::emit(PipelineEvent::Unresolved { field: self.field }),
        }
        found
    }
}
