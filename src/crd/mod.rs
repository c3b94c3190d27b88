//! Custom resource actions and probes
//!
//! Objects are handled as [`DynamicObject`]s addressed by group, version and
//! plural, either inside a namespace or cluster wide. Results are handed back
//! as the JSON the API server returned.

use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::discovery::ApiResource;
use kube::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::error::{is_conflict, AppError, AppResult};
use crate::k8s::default_namespace;
use crate::k8s::manifest::load_body;

const FIELD_MANAGER: &str = "chaosk8s";

/// Group, version and plural naming a custom resource type
#[derive(Debug, Clone, Deserialize)]
pub struct CrdRef {
    pub group: String,
    pub version: String,
    pub plural: String,
}

impl CrdRef {
    pub fn new(group: &str, version: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            plural: plural.to_string(),
        }
    }

    fn api_resource(&self, kind: &str) -> ApiResource {
        let api_version = if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        };
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version,
            kind: kind.to_string(),
            plural: self.plural.clone(),
        }
    }

    fn api(&self, client: &Client, kind: &str, ns: Option<&str>) -> Api<DynamicObject> {
        let ar = self.api_resource(kind);
        match ns {
            Some(ns) => Api::namespaced_with(client.clone(), ns, &ar),
            None => Api::all_with(client.clone(), &ar),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCustomObjectParams {
    #[serde(flatten)]
    pub crd: CrdRef,
    #[serde(default = "default_namespace")]
    pub ns: String,
    #[serde(default)]
    pub resource: Option<Value>,
    #[serde(default)]
    pub resource_as_yaml_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomObjectNameParams {
    #[serde(flatten)]
    pub crd: CrdRef,
    pub name: String,
    #[serde(default = "default_namespace")]
    pub ns: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCustomObjectParams {
    #[serde(flatten)]
    pub crd: CrdRef,
    pub name: String,
    #[serde(default = "default_namespace")]
    pub ns: String,
    /// Re-acquire fields owned by other managers (server-side apply)
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub resource: Option<Value>,
    #[serde(default)]
    pub resource_as_yaml_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListCustomObjectsParams {
    #[serde(flatten)]
    pub crd: CrdRef,
    #[serde(default = "default_namespace")]
    pub ns: String,
}

fn failed(verb: &str, err: kube::Error) -> AppError {
    AppError::request(&format!("Failed to {} custom resource object", verb), err)
}

fn into_object(body: Value) -> AppResult<DynamicObject> {
    Ok(serde_json::from_value(body)?)
}

fn kind_of(body: &Value) -> &str {
    body.get("kind").and_then(Value::as_str).unwrap_or_default()
}

fn name_of(body: &Value) -> Option<&str> {
    body.pointer("/metadata/name").and_then(Value::as_str)
}

async fn create(crd: &CrdRef, client: &Client, ns: Option<&str>, body: Value) -> AppResult<Value> {
    let api = crd.api(client, kind_of(&body), ns);
    let name = name_of(&body).map(str::to_string);
    let object = into_object(body)?;

    match api.create(&PostParams::default(), &object).await {
        Ok(created) => {
            info!(plural = %crd.plural, name = ?created.metadata.name, "Created custom object");
            Ok(serde_json::to_value(created)?)
        }
        Err(e) if is_conflict(&e) => {
            debug!("Custom resource object {}/{} already exists", crd.group, crd.version);
            let Some(name) = name else {
                return Err(failed("create", e));
            };
            let existing = api.get(&name).await.map_err(|e| failed("create", e))?;
            Ok(serde_json::to_value(existing)?)
        }
        Err(e) => Err(failed("create", e)),
    }
}

async fn delete(crd: &CrdRef, client: &Client, ns: Option<&str>, name: &str) -> AppResult<Value> {
    let api = crd.api(client, "", ns);
    let deleted = api
        .delete(name, &DeleteParams::default())
        .await
        .map_err(|e| failed("delete", e))?;
    info!(plural = %crd.plural, name, "Deleted custom object");
    Ok(deleted.either(serde_json::to_value, serde_json::to_value)?)
}

async fn patch(
    crd: &CrdRef,
    client: &Client,
    ns: Option<&str>,
    name: &str,
    force: bool,
    body: Value,
) -> AppResult<Value> {
    let api = crd.api(client, kind_of(&body), ns);
    let patched = if force {
        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(name, &params, &Patch::Apply(&body)).await
    } else {
        api.patch(name, &PatchParams::default(), &Patch::Merge(&body)).await
    }
    .map_err(|e| failed("patch", e))?;
    info!(plural = %crd.plural, name, force, "Patched custom object");
    Ok(serde_json::to_value(patched)?)
}

async fn replace(crd: &CrdRef, client: &Client, ns: Option<&str>, name: &str, body: Value) -> AppResult<Value> {
    let api = crd.api(client, kind_of(&body), ns);
    let object = into_object(body)?;
    let replaced = api
        .replace(name, &PostParams::default(), &object)
        .await
        .map_err(|e| failed("replace", e))?;
    info!(plural = %crd.plural, name, "Replaced custom object");
    Ok(serde_json::to_value(replaced)?)
}

async fn get(crd: &CrdRef, client: &Client, ns: Option<&str>, name: &str) -> AppResult<Value> {
    let object = crd
        .api(client, "", ns)
        .get(name)
        .await
        .map_err(|e| failed("get", e))?;
    Ok(serde_json::to_value(object)?)
}

async fn list(crd: &CrdRef, client: &Client, ns: Option<&str>) -> AppResult<Value> {
    let list = crd
        .api(client, "", ns)
        .list(&ListParams::default())
        .await
        .map_err(|e| failed("list", e))?;
    Ok(json!({
        "apiVersion": crd.api_resource("").api_version,
        "kind": "List",
        "metadata": list.metadata,
        "items": list.items,
    }))
}

/// Create a custom object in a namespace. An already existing object is
/// returned as is.
#[instrument(skip(client))]
pub async fn create_custom_object(client: &Client, params: &CreateCustomObjectParams) -> AppResult<Value> {
    let body = load_body(params.resource.as_ref(), params.resource_as_yaml_file.as_deref())?;
    create(&params.crd, client, Some(&params.ns), body).await
}

#[instrument(skip(client))]
pub async fn create_cluster_custom_object(client: &Client, params: &CreateCustomObjectParams) -> AppResult<Value> {
    let body = load_body(params.resource.as_ref(), params.resource_as_yaml_file.as_deref())?;
    create(&params.crd, client, None, body).await
}

#[instrument(skip(client))]
pub async fn delete_custom_object(client: &Client, params: &CustomObjectNameParams) -> AppResult<Value> {
    delete(&params.crd, client, Some(&params.ns), &params.name).await
}

#[instrument(skip(client))]
pub async fn delete_cluster_custom_object(client: &Client, params: &CustomObjectNameParams) -> AppResult<Value> {
    delete(&params.crd, client, None, &params.name).await
}

#[instrument(skip(client))]
pub async fn patch_custom_object(client: &Client, params: &UpdateCustomObjectParams) -> AppResult<Value> {
    let body = load_body(params.resource.as_ref(), params.resource_as_yaml_file.as_deref())?;
    patch(&params.crd, client, Some(&params.ns), &params.name, params.force, body).await
}

#[instrument(skip(client))]
pub async fn patch_cluster_custom_object(client: &Client, params: &UpdateCustomObjectParams) -> AppResult<Value> {
    let body = load_body(params.resource.as_ref(), params.resource_as_yaml_file.as_deref())?;
    patch(&params.crd, client, None, &params.name, params.force, body).await
}

#[instrument(skip(client))]
pub async fn replace_custom_object(client: &Client, params: &UpdateCustomObjectParams) -> AppResult<Value> {
    let body = load_body(params.resource.as_ref(), params.resource_as_yaml_file.as_deref())?;
    replace(&params.crd, client, Some(&params.ns), &params.name, body).await
}

#[instrument(skip(client))]
pub async fn replace_cluster_custom_object(client: &Client, params: &UpdateCustomObjectParams) -> AppResult<Value> {
    let body = load_body(params.resource.as_ref(), params.resource_as_yaml_file.as_deref())?;
    replace(&params.crd, client, None, &params.name, body).await
}

#[instrument(skip(client))]
pub async fn get_custom_object(client: &Client, params: &CustomObjectNameParams) -> AppResult<Value> {
    get(&params.crd, client, Some(&params.ns), &params.name).await
}

#[instrument(skip(client))]
pub async fn get_cluster_custom_object(client: &Client, params: &CustomObjectNameParams) -> AppResult<Value> {
    get(&params.crd, client, None, &params.name).await
}

#[instrument(skip(client))]
pub async fn list_custom_objects(client: &Client, params: &ListCustomObjectsParams) -> AppResult<Value> {
    list(&params.crd, client, Some(&params.ns)).await
}

#[instrument(skip(client))]
pub async fn list_cluster_custom_objects(client: &Client, params: &ListCustomObjectsParams) -> AppResult<Value> {
    list(&params.crd, client, None).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_resource_from_group_version_plural() {
        let crd = CrdRef::new("chaos-mesh.org", "v1alpha1", "networkchaos");
        let ar = crd.api_resource("NetworkChaos");
        assert_eq!(ar.api_version, "chaos-mesh.org/v1alpha1");
        assert_eq!(ar.plural, "networkchaos");
        assert_eq!(ar.kind, "NetworkChaos");

        let core = CrdRef::new("", "v1", "configmaps").api_resource("");
        assert_eq!(core.api_version, "v1");
    }

    #[test]
    fn test_params_flatten_the_resource_type() {
        let params: UpdateCustomObjectParams = serde_json::from_value(json!({
            "group": "example.com",
            "version": "v1",
            "plural": "widgets",
            "name": "w1",
            "resource": {"spec": {"size": 2}}
        }))
        .unwrap();
        assert_eq!(params.crd.plural, "widgets");
        assert_eq!(params.ns, "default");
        assert!(!params.force);
    }

    #[test]
    fn test_body_accessors() {
        let body = json!({"kind": "Widget", "metadata": {"name": "w1"}});
        assert_eq!(kind_of(&body), "Widget");
        assert_eq!(name_of(&body), Some("w1"));
        assert_eq!(kind_of(&json!({})), "");
    }
}
