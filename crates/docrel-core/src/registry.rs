//! Model and association registry
//!
//! Models are declared once at startup with [`RegistryBuilder`]. `build`
//! validates every association, resolves many-to-many array keys from their
//! reciprocal holder association, and derives each model's post-save hooks.
//! The resulting [`Registry`] is immutable and shared behind an `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::association::config::{ArrayEnd, AssociationConfig, AssociationKind};
use crate::association::hook::PostSaveHook;
use crate::errors::{DocRelError, Result};
use crate::query::FindOptions;
use crate::{log_op_end, log_op_error, log_op_start};

#[derive(Debug, Clone, PartialEq)]
enum DeclKind {
    Polymorphic { as_name: Option<String> },
    ManyToMany { source: Option<String> },
    InArray { in_key: Option<String> },
}

/// Unvalidated association declaration
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationDecl {
    name: String,
    target: String,
    kind: DeclKind,
    finder_options: FindOptions,
}

impl AssociationDecl {
    /// One owner to many peers keyed by `<as>_type` / `<as>_id`
    pub fn polymorphic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, target, DeclKind::Polymorphic { as_name: None })
    }

    /// Source end of an array many-to-many; peers hold the owner's id
    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, target, DeclKind::ManyToMany { source: None })
    }

    /// Holder end of an array many-to-many; the owner holds peer ids
    pub fn in_array(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, target, DeclKind::InArray { in_key: None })
    }

    fn with_kind(name: impl Into<String>, target: impl Into<String>, kind: DeclKind) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            finder_options: FindOptions::default(),
        }
    }

    /// Polymorphic prefix (`as`); ignored for other kinds
    pub fn as_name(mut self, as_name: impl Into<String>) -> Self {
        if let DeclKind::Polymorphic { as_name: slot } = &mut self.kind {
            *slot = Some(as_name.into());
        }
        self
    }

    /// Reciprocal holder association on the target (`source`); ignored for
    /// other kinds
    pub fn source(mut self, source: impl Into<String>) -> Self {
        if let DeclKind::ManyToMany { source: slot } = &mut self.kind {
            *slot = Some(source.into());
        }
        self
    }

    /// Array field on the owner (`in`); ignored for other kinds
    pub fn in_key(mut self, in_key: impl Into<String>) -> Self {
        if let DeclKind::InArray { in_key: slot } = &mut self.kind {
            *slot = Some(in_key.into());
        }
        self
    }

    pub fn finder_options(mut self, options: FindOptions) -> Self {
        self.finder_options = options;
        self
    }
}

/// Model declaration
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    name: String,
    required: Vec<String>,
    associations: Vec<AssociationDecl>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            associations: Vec::new(),
        }
    }

    /// Key that must be present and non-blank for a save to succeed
    pub fn required(mut self, key: impl Into<String>) -> Self {
        self.required.push(key.into());
        self
    }

    pub fn association(mut self, decl: AssociationDecl) -> Self {
        self.associations.push(decl);
        self
    }
}

/// Validated model
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub name: String,
    pub required_keys: Vec<String>,
    /// Associations in declaration order
    pub associations: Vec<Arc<AssociationConfig>>,
    /// Hooks in declaration order
    pub post_save_hooks: Vec<PostSaveHook>,
}

impl ModelEntry {
    pub fn association(&self, name: &str) -> Option<&Arc<AssociationConfig>> {
        self.associations.iter().find(|a| a.name == name)
    }
}

/// Collects model declarations
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    models: Vec<ModelDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, def: ModelDef) -> Self {
        self.models.push(def);
        self
    }

    /// Validate declarations and freeze them
    ///
    /// # Errors
    ///
    /// - `DuplicateModel` if a model name is declared twice
    /// - `ScopeMisconfiguration` for a blank name or parameter, an unknown
    ///   target model, a duplicate association name, or a `source` that does
    ///   not name an `in_array` association pointing back at the owner
    pub fn build(self) -> Result<Registry> {
        log_op_start!("registry_build", models = self.models.len());
        let start = Instant::now();

        let registry = build_impl(self.models).map_err(|e| {
            log_op_error!(
                "registry_build",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "registry_build",
            duration_ms = start.elapsed().as_millis() as u64,
            models = registry.models.len()
        );
        Ok(registry)
    }
}

fn misconfigured(model: &str, association: &str, reason: impl Into<String>) -> DocRelError {
    DocRelError::ScopeMisconfiguration {
        model: model.to_string(),
        association: association.to_string(),
        reason: reason.into(),
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn build_impl(defs: Vec<ModelDef>) -> Result<Registry> {
    let mut by_name: HashMap<String, &ModelDef> = HashMap::new();
    for def in &defs {
        if def.name.trim().is_empty() {
            return Err(misconfigured(&def.name, "", "model name is blank"));
        }
        if by_name.insert(def.name.clone(), def).is_some() {
            return Err(DocRelError::DuplicateModel {
                model: def.name.clone(),
            });
        }
    }

    let mut models = HashMap::new();
    for def in &defs {
        let mut associations: Vec<Arc<AssociationConfig>> = Vec::new();
        for decl in &def.associations {
            if decl.name.trim().is_empty() {
                return Err(misconfigured(&def.name, &decl.name, "association name is blank"));
            }
            if associations.iter().any(|a| a.name == decl.name) {
                return Err(misconfigured(
                    &def.name,
                    &decl.name,
                    "association declared more than once",
                ));
            }
            let Some(target) = by_name.get(&decl.target) else {
                return Err(misconfigured(
                    &def.name,
                    &decl.name,
                    format!("target model {} is not registered", decl.target),
                ));
            };
            let kind = resolve_kind(def, decl, target)?;
            associations.push(Arc::new(AssociationConfig {
                name: decl.name.clone(),
                owner_model: def.name.clone(),
                target_model: decl.target.clone(),
                kind,
                finder_options: decl.finder_options.clone(),
            }));
        }

        let post_save_hooks = associations
            .iter()
            .filter(|a| a.needs_post_save_hook())
            .map(|a| PostSaveHook {
                association: a.name.clone(),
            })
            .collect();

        tracing::debug!(
            model = %def.name,
            associations = associations.len(),
            "registered model"
        );

        models.insert(
            def.name.clone(),
            ModelEntry {
                name: def.name.clone(),
                required_keys: def.required.clone(),
                associations,
                post_save_hooks,
            },
        );
    }

    Ok(Registry { models })
}

fn resolve_kind(owner: &ModelDef, decl: &AssociationDecl, target: &ModelDef) -> Result<AssociationKind> {
    match &decl.kind {
        DeclKind::Polymorphic { as_name } => {
            let as_name = non_blank(as_name)
                .ok_or_else(|| misconfigured(&owner.name, &decl.name, "`as` is required"))?;
            Ok(AssociationKind::PolymorphicOneToMany {
                as_name: as_name.to_string(),
            })
        }
        DeclKind::InArray { in_key } => {
            let in_key = non_blank(in_key)
                .ok_or_else(|| misconfigured(&owner.name, &decl.name, "`in` is required"))?;
            Ok(AssociationKind::ArrayManyToMany(ArrayEnd::Holder {
                in_key: in_key.to_string(),
            }))
        }
        DeclKind::ManyToMany { source } => {
            let source = non_blank(source)
                .ok_or_else(|| misconfigured(&owner.name, &decl.name, "`source` is required"))?;
            let reciprocal = target
                .associations
                .iter()
                .find(|a| a.name == source)
                .ok_or_else(|| {
                    misconfigured(
                        &owner.name,
                        &decl.name,
                        format!("source {source} is not an association of {}", target.name),
                    )
                })?;
            let DeclKind::InArray { in_key } = &reciprocal.kind else {
                return Err(misconfigured(
                    &owner.name,
                    &decl.name,
                    format!("source {}.{source} is not an in_array association", target.name),
                ));
            };
            if reciprocal.target != owner.name {
                return Err(misconfigured(
                    &owner.name,
                    &decl.name,
                    format!(
                        "source {}.{source} targets {}, not {}",
                        target.name, reciprocal.target, owner.name
                    ),
                ));
            }
            let in_key = non_blank(in_key).ok_or_else(|| {
                misconfigured(
                    &owner.name,
                    &decl.name,
                    format!("source {}.{source} has no `in` key", target.name),
                )
            })?;
            Ok(AssociationKind::ArrayManyToMany(ArrayEnd::Source {
                source: source.to_string(),
                in_key: in_key.to_string(),
            }))
        }
    }
}

/// Immutable registry of validated models
#[derive(Debug, Clone)]
pub struct Registry {
    models: HashMap<String, ModelEntry>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// # Errors
    ///
    /// Returns `UnknownModel` if the model was never registered.
    pub fn model(&self, name: &str) -> Result<&ModelEntry> {
        self.models.get(name).ok_or_else(|| DocRelError::UnknownModel {
            model: name.to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns `UnknownModel` or `UnknownAssociation`.
    pub fn association(&self, model: &str, name: &str) -> Result<&Arc<AssociationConfig>> {
        self.model(model)?
            .association(name)
            .ok_or_else(|| DocRelError::UnknownAssociation {
                model: model.to_string(),
                association: name.to_string(),
            })
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    /// Registered model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Install a registry process-wide; only the first install wins
    ///
    /// Returns the installed registry, which is `registry` on first call.
    pub fn install(registry: Arc<Registry>) -> Arc<Registry> {
        GLOBAL_REGISTRY.get_or_init(|| registry).clone()
    }

    /// The process-wide registry, if one was installed
    pub fn global() -> Option<Arc<Registry>> {
        GLOBAL_REGISTRY.get().cloned()
    }
}
