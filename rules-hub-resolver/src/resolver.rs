//! Concurrent resolution of template variables

use rules_hub_core::{CoreError, RenderedTemplate, TemplateReply, VariableDescriptor};
use rules_hub_facts::FactRegistry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::traits::{first_emission, AssetPathService, LocalisationService};
use crate::ResolverError;

/// Resolves template replies into rendered text
///
/// Every placeholder resolves independently and concurrently; fact and
/// collaborator lookups suspend until their first emission. Unknown
/// variable types never abort the resolution, they only raise
/// `unknown_type_found`; a collaborator failure fails the whole call.
pub struct TemplateResolver {
    facts: Arc<FactRegistry>,
    localisation: Arc<dyn LocalisationService>,
    assets: Arc<dyn AssetPathService>,
}

impl TemplateResolver {
    pub fn new(
        facts: Arc<FactRegistry>,
        localisation: Arc<dyn LocalisationService>,
        assets: Arc<dyn AssetPathService>,
    ) -> Self {
        Self {
            facts,
            localisation,
            assets,
        }
    }

    /// Resolve every variable of the reply and substitute the results
    ///
    /// Resolved placeholders are replaced by exact textual substitution of
    /// their `<%= name %>` marker; placeholders of unknown type keep their
    /// marker verbatim in the output.
    pub async fn resolve(&self, reply: TemplateReply) -> Result<RenderedTemplate, ResolverError> {
        reply.validate()?;
        let TemplateReply { vars, template } = reply;
        let vars = Arc::new(vars);

        let mut tasks: JoinSet<Result<Option<(String, String)>, ResolverError>> = JoinSet::new();
        for (name, descriptor) in vars.iter() {
            let name = name.clone();
            let descriptor = descriptor.clone();
            let vars = vars.clone();
            let facts = self.facts.clone();
            let localisation = self.localisation.clone();
            let assets = self.assets.clone();
            tasks.spawn(async move {
                resolve_variable(name, descriptor, vars, facts, localisation, assets).await
            });
        }

        let mut resolved = Vec::new();
        let mut unknown_type_found = false;
        while let Some(joined) = tasks.join_next().await {
            match joined? {
                Ok(Some(pair)) => resolved.push(pair),
                Ok(None) => unknown_type_found = true,
                Err(e) => return Err(e),
            }
        }

        if unknown_type_found {
            tracing::warn!("template contains variables of an unknown type");
        }

        let mut rendered_template = template;
        for (name, value) in resolved {
            rendered_template = rendered_template.replace(&format!("<%= {name} %>"), &value);
        }

        Ok(RenderedTemplate {
            rendered_template,
            unknown_type_found,
        })
    }
}

/// Resolve one variable to its final string value
///
/// Returns `None` for unknown descriptor types, which leaves the
/// placeholder untouched and raises the result flag.
async fn resolve_variable(
    name: String,
    descriptor: VariableDescriptor,
    vars: Arc<HashMap<String, VariableDescriptor>>,
    facts: Arc<FactRegistry>,
    localisation: Arc<dyn LocalisationService>,
    assets: Arc<dyn AssetPathService>,
) -> Result<Option<(String, String)>, ResolverError> {
    let value = match descriptor {
        VariableDescriptor::Literal { value } => render_value(&value),
        VariableDescriptor::RelativeUrl { value } => {
            first_emission(assets.resolve_path(&value), &value).await?
        }
        VariableDescriptor::Fact { value } => render_value(&facts.snapshot(&value).await?),
        VariableDescriptor::Localisation { value: key, vars: params } => {
            let mut snapshots = JoinSet::new();
            for param in params {
                let fact_name = match vars.get(&param) {
                    Some(VariableDescriptor::Fact { value }) => value.clone(),
                    _ => {
                        return Err(CoreError::InvalidReply(format!(
                            "localisation '{name}' parameter '{param}' is not a fact variable"
                        ))
                        .into())
                    }
                };
                let facts = facts.clone();
                snapshots.spawn(async move {
                    let snapshot = facts.snapshot(&fact_name).await?;
                    Ok::<_, ResolverError>((fact_name, snapshot))
                });
            }

            // Parameters are keyed by the referenced fact name, matching the
            // placeholders of the translated message.
            let mut parameters = HashMap::new();
            while let Some(joined) = snapshots.join_next().await {
                let (fact_name, snapshot) = joined??;
                parameters.insert(fact_name, snapshot);
            }

            first_emission(localisation.translate(&key, parameters), &key).await?
        }
        VariableDescriptor::Unknown => return Ok(None),
    };
    Ok(Some((name, value)))
}

/// Render a fact or literal value as template text
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
