use std::fmt::Debug;

use kube::{Api, Resource, ResourceExt as _, api::ListParams};
use metal_provider_crd::{Reference, Selector};
use serde::de::DeserializeOwned;
use tracing::{Level, instrument};

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("Cannot get referenced {kind} {name:?}: {source}")]
    Get {
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Cannot list {kind} matching {selector:?}: {source}")]
    List {
        kind: String,
        selector: String,
        #[source]
        source: kube::Error,
    },

    #[error("Referenced {kind} {name:?} has no ID yet.")]
    NotReady { kind: String, name: String },

    #[error("No {kind} with an ID matches {selector:?}.")]
    NoMatch { kind: String, selector: String },
}

/// A value taken from another resource, and the reference that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub value: String,
    pub reference: Reference,
}

pub trait ReferenceExt<K> {
    /// Looks up the value a reference or selector points at. Values that are
    /// set already are kept, so clearing one triggers a new lookup.
    async fn resolve(
        &self,
        current: &str,
        reference: Option<&Reference>,
        selector: Option<&Selector>,
        extract: fn(&K) -> &str,
    ) -> Result<Option<Resolved>, ReferenceError>;
}

impl<K> ReferenceExt<K> for Api<K>
where
    K: Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned,
{
    #[instrument(skip_all, fields(kind = %K::kind(&())), ret(level = Level::DEBUG), err(level = Level::WARN))]
    async fn resolve(
        &self,
        current: &str,
        reference: Option<&Reference>,
        selector: Option<&Selector>,
        extract: fn(&K) -> &str,
    ) -> Result<Option<Resolved>, ReferenceError> {
        if !current.is_empty() {
            return Ok(None);
        }

        let kind = K::kind(&()).into_owned();

        if let Some(reference) = reference {
            let object = self
                .get(&reference.name)
                .await
                .map_err(|source| ReferenceError::Get {
                    kind: kind.clone(),
                    name: reference.name.clone(),
                    source,
                })?;

            let value = extract(&object);
            if value.is_empty() {
                return Err(ReferenceError::NotReady {
                    kind,
                    name: reference.name.clone(),
                });
            }

            return Ok(Some(Resolved {
                value: value.to_owned(),
                reference: reference.clone(),
            }));
        }

        let Some(selector) = selector else {
            return Ok(None);
        };

        let query = selector.to_label_selector();
        let objects = self
            .list(&ListParams::default().labels(&query))
            .await
            .map_err(|source| ReferenceError::List {
                kind: kind.clone(),
                selector: query.clone(),
                source,
            })?;

        objects
            .items
            .iter()
            .find_map(|object| {
                let value = extract(object);

                (!value.is_empty()).then(|| Resolved {
                    value: value.to_owned(),
                    reference: Reference {
                        name: object.name_any(),
                    },
                })
            })
            .map(Some)
            .ok_or(ReferenceError::NoMatch {
                kind,
                selector: query,
            })
    }
}
