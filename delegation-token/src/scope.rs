use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::error::{ScopeRejection, TokenError};

/// Decides whether a token's scope covers the resource being accessed.
///
/// `target` is the URI of the request the token is presented with, or `None`
/// when the caller has nothing to compare against. Any closure with the same
/// shape is a validator too.
pub trait ScopeValidator: Send + Sync {
    fn verify_scope(&self, scope: &Url, target: Option<&str>) -> Result<(), ScopeRejection>;
}

impl<F> ScopeValidator for F
where
    F: Fn(&Url, Option<&str>) -> Result<(), ScopeRejection> + Send + Sync,
{
    fn verify_scope(&self, scope: &Url, target: Option<&str>) -> Result<(), ScopeRejection> {
        self(scope, target)
    }
}

/// Default policy: the target must be the scope itself.
///
/// A target that parses as a URI is compared in its normalised form, so a
/// differently cased scheme or host still matches. Paths, queries and
/// fragments compare exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactScopeValidator;

impl ScopeValidator for ExactScopeValidator {
    fn verify_scope(&self, scope: &Url, target: Option<&str>) -> Result<(), ScopeRejection> {
        let target = target.ok_or_else(|| {
            ScopeRejection::new(format!("scope {scope} requires a request target"))
        })?;
        if scope.as_str() == target || Url::parse(target).is_ok_and(|target| &target == scope) {
            Ok(())
        } else {
            Err(ScopeRejection::new(format!(
                "scope {scope} does not cover {target}"
            )))
        }
    }
}

/// Accepts the scope itself and any target below it.
///
/// The match stops at a path segment boundary: `.../vault` covers
/// `.../vault/nodes` and `.../vault?list` but not `.../vault-admin`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixScopeValidator;

impl ScopeValidator for PrefixScopeValidator {
    fn verify_scope(&self, scope: &Url, target: Option<&str>) -> Result<(), ScopeRejection> {
        let target = target.ok_or_else(|| {
            ScopeRejection::new(format!("scope {scope} requires a request target"))
        })?;
        let covered = is_below(scope.as_str(), target)
            || Url::parse(target)
                .is_ok_and(|normalized| is_below(scope.as_str(), normalized.as_str()));
        if covered {
            Ok(())
        } else {
            Err(ScopeRejection::new(format!(
                "{target} is outside scope {scope}"
            )))
        }
    }
}

fn is_below(scope: &str, target: &str) -> bool {
    match target.strip_prefix(scope) {
        Some(rest) => {
            scope.ends_with('/') || rest.is_empty() || rest.starts_with(['/', '?', '#'])
        }
        None => false,
    }
}

type ValidatorFactory = Box<dyn Fn() -> Arc<dyn ScopeValidator> + Send + Sync>;

/// Name-to-validator table used to pick the scope policy from configuration.
///
/// Built-in validators answer to a short name (`exact`, `prefix`) and to
/// their full Rust type path.
pub struct ScopeValidatorRegistry {
    factories: HashMap<String, ValidatorFactory>,
}

impl ScopeValidatorRegistry {
    pub const EXACT: &'static str = "exact";
    pub const PREFIX: &'static str = "prefix";

    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register_default::<ExactScopeValidator>(Self::EXACT);
        registry.register_default::<PrefixScopeValidator>(Self::PREFIX);
        registry
    }

    /// Registers a validator under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn ScopeValidator> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Registers a `Default` validator under `name` and under its type path.
    pub fn register_default<V>(&mut self, name: impl Into<String>)
    where
        V: ScopeValidator + Default + 'static,
    {
        self.register(name, || Arc::new(V::default()) as Arc<dyn ScopeValidator>);
        self.register(type_name::<V>(), || {
            Arc::new(V::default()) as Arc<dyn ScopeValidator>
        });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Looks up a validator by name; `None` gives the default exact policy.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::UnknownScopeValidator` if the name is not registered.
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn ScopeValidator>, TokenError> {
        let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) else {
            return Ok(Arc::new(ExactScopeValidator));
        };
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| TokenError::UnknownScopeValidator(name.to_string()))
    }
}

impl Default for ScopeValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopeValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeValidatorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
