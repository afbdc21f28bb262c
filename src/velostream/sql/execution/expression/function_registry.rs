//! Runtime function registry.
//!
//! Expressions resolve function names against a [`FunctionRegistry`] when they are
//! evaluated, never when they are compiled, so registration order relative to
//! compilation does not matter. The registry is injected into engines and
//! expressions; [`FunctionRegistry::global`] is the shared default holding the
//! built-ins.

use super::function_metadata::{FunctionKind, all_registered_functions};
use crate::velostream::sql::error::SqlError;
use crate::velostream::sql::execution::aggregation::accumulator::Accumulator;
use crate::velostream::sql::execution::types::FieldValue;
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Scalar implementation as stored in the registry.
pub type ScalarFunction =
    Arc<dyn Fn(&[FieldValue]) -> Result<FieldValue, SqlError> + Send + Sync>;

/// Factory producing a fresh accumulator from the call's literal parameters.
pub type AggregateFactoryFn =
    Arc<dyn Fn(&[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> + Send + Sync>;

/// Accepted argument count for a registered function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub fn exact(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub fn variadic(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn accepts(&self, n: usize) -> bool {
        n >= self.min && self.max.is_none_or(|max| n <= max)
    }

    fn describe(&self) -> String {
        match self.max {
            Some(max) if max == self.min => format!("{}", max),
            Some(max) => format!("{} to {}", self.min, max),
            None => format!("at least {}", self.min),
        }
    }
}

#[derive(Clone)]
struct ScalarEntry {
    arity: Arity,
    handler: ScalarFunction,
}

/// A registered aggregate: its arity and accumulator factory.
#[derive(Clone)]
pub struct AggregateEntry {
    pub arity: Arity,
    pub factory: AggregateFactoryFn,
}

impl AggregateEntry {
    /// Create a fresh accumulator for one (group, window).
    pub fn create(&self, params: &[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> {
        (self.factory)(params)
    }
}

static GLOBAL_REGISTRY: LazyLock<Arc<FunctionRegistry>> =
    LazyLock::new(|| Arc::new(FunctionRegistry::with_builtins()));

/// Thread-safe name to implementation map for scalar and aggregate functions.
///
/// Names are case-insensitive. Reads take a shared lock; registration takes an
/// exclusive one and never replaces an existing name.
#[derive(Default)]
pub struct FunctionRegistry {
    scalars: RwLock<HashMap<String, ScalarEntry>>,
    aggregates: RwLock<HashMap<String, AggregateEntry>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry populated with every self-registered built-in.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        {
            let mut scalars = write_lock(&registry.scalars);
            let mut aggregates = write_lock(&registry.aggregates);
            for def in all_registered_functions() {
                let arity = Arity {
                    min: def.min_args,
                    max: def.max_args,
                };
                let names = std::iter::once(def.name).chain(def.aliases.iter().copied());
                for name in names {
                    match def.kind {
                        FunctionKind::Scalar(handler) => {
                            scalars.insert(
                                name.to_uppercase(),
                                ScalarEntry {
                                    arity,
                                    handler: Arc::new(handler),
                                },
                            );
                        }
                        FunctionKind::Aggregate(factory) => {
                            aggregates.insert(
                                name.to_uppercase(),
                                AggregateEntry {
                                    arity,
                                    factory: Arc::new(factory),
                                },
                            );
                        }
                    }
                }
            }
            debug!(
                "Function registry loaded {} scalar and {} aggregate names",
                scalars.len(),
                aggregates.len()
            );
        }
        registry
    }

    /// Process-wide registry holding the built-ins.
    pub fn global() -> Arc<FunctionRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Resolve a scalar function.
    pub fn lookup(&self, name: &str) -> Option<ScalarFunction> {
        read_lock(&self.scalars)
            .get(&name.to_uppercase())
            .map(|entry| Arc::clone(&entry.handler))
    }

    /// Resolve an aggregate function.
    pub fn lookup_aggregate(&self, name: &str) -> Option<AggregateEntry> {
        read_lock(&self.aggregates)
            .get(&name.to_uppercase())
            .cloned()
    }

    /// Argument count accepted by `name`, scalar or aggregate.
    pub fn arity(&self, name: &str) -> Option<Arity> {
        let key = name.to_uppercase();
        if let Some(entry) = read_lock(&self.scalars).get(&key) {
            return Some(entry.arity);
        }
        read_lock(&self.aggregates).get(&key).map(|entry| entry.arity)
    }

    /// Check `n` arguments against the registered arity of `name`.
    pub fn check_arity(&self, name: &str, n: usize) -> Result<(), SqlError> {
        let arity = self
            .arity(name)
            .ok_or_else(|| SqlError::unknown_function_error(name.to_uppercase()))?;
        if arity.accepts(n) {
            Ok(())
        } else {
            Err(arity_error(name, arity, n))
        }
    }

    /// Resolve, arity-check and invoke a scalar function.
    pub fn call(&self, name: &str, args: &[FieldValue]) -> Result<FieldValue, SqlError> {
        let entry = read_lock(&self.scalars).get(&name.to_uppercase()).cloned();
        match entry {
            Some(entry) if entry.arity.accepts(args.len()) => (entry.handler)(args),
            Some(entry) => Err(arity_error(name, entry.arity, args.len())),
            None if self.is_aggregate(name) => Err(SqlError::execution_error(
                format!(
                    "Aggregate function {} cannot be evaluated on a single record",
                    name.to_uppercase()
                ),
                None,
            )),
            None => Err(SqlError::unknown_function_error(name.to_uppercase())),
        }
    }

    /// Register a scalar function. Registering an existing name is a configuration error.
    pub fn register_scalar<F>(&self, name: &str, arity: Arity, handler: F) -> Result<(), SqlError>
    where
        F: Fn(&[FieldValue]) -> Result<FieldValue, SqlError> + Send + Sync + 'static,
    {
        let key = name.to_uppercase();
        self.ensure_unregistered(&key)?;
        let mut scalars = write_lock(&self.scalars);
        if scalars.contains_key(&key) {
            return Err(duplicate_error(&key));
        }
        scalars.insert(
            key.clone(),
            ScalarEntry {
                arity,
                handler: Arc::new(handler),
            },
        );
        debug!("Registered scalar function {}", key);
        Ok(())
    }

    /// Register a user-defined aggregate backed by an accumulator factory.
    pub fn register_aggregate<F>(
        &self,
        name: &str,
        arity: Arity,
        factory: F,
    ) -> Result<(), SqlError>
    where
        F: Fn(&[FieldValue]) -> Result<Box<dyn Accumulator>, SqlError> + Send + Sync + 'static,
    {
        let key = name.to_uppercase();
        self.ensure_unregistered(&key)?;
        let mut aggregates = write_lock(&self.aggregates);
        if aggregates.contains_key(&key) {
            return Err(duplicate_error(&key));
        }
        aggregates.insert(
            key.clone(),
            AggregateEntry {
                arity,
                factory: Arc::new(factory),
            },
        );
        debug!("Registered aggregate function {}", key);
        Ok(())
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        read_lock(&self.aggregates).contains_key(&name.to_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        let key = name.to_uppercase();
        read_lock(&self.scalars).contains_key(&key)
            || read_lock(&self.aggregates).contains_key(&key)
    }

    /// All registered names, sorted.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read_lock(&self.scalars).keys().cloned().collect();
        names.extend(read_lock(&self.aggregates).keys().cloned());
        names.sort();
        names
    }

    fn ensure_unregistered(&self, key: &str) -> Result<(), SqlError> {
        if self.contains(key) {
            return Err(duplicate_error(key));
        }
        Ok(())
    }
}

fn duplicate_error(key: &str) -> SqlError {
    SqlError::configuration_error(format!("Function {} is already registered", key))
}

fn arity_error(name: &str, arity: Arity, got: usize) -> SqlError {
    SqlError::execution_error(
        format!(
            "{} expects {} argument(s), got {}",
            name.to_uppercase(),
            arity.describe(),
            got
        ),
        None,
    )
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("scalars", &read_lock(&self.scalars).len())
            .field("aggregates", &read_lock(&self.aggregates).len())
            .finish()
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        warn!("Function registry lock poisoned, recovering");
        poisoned.into_inner()
    })
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!("Function registry lock poisoned, recovering");
        poisoned.into_inner()
    })
}
