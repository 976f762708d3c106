//! In-memory Resource Manager emulation for provisioning tests.
//!
//! Resources are stored by path. Each long-running resource type completes through a
//! different protocol so a full run exercises all of them:
//!
//! - storage accounts: `202` + `Location`
//! - virtual networks: `201` with a non-terminal `provisioningState`, polled on the resource
//! - subnets and virtual machines: `201` + `Azure-AsyncOperation`
//! - resource groups and network interfaces: immediate result

#![allow(dead_code)]

use azprov::{Provisioner, ProvisionerBuilder};
use azprov_core::auth::Session;
use azprov_core::client::PollPolicy;
use azprov_core::config::ProvisionerConfig;
use azprov_core::uuid::SubscriptionId;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";

/// Polls each long-running resource needs before it reports `Succeeded`.
const POLLS_TO_COMPLETE: u32 = 2;

#[derive(Debug)]
struct Stored {
    doc: Value,
    polls_left: u32,
}

#[derive(Debug, Default)]
struct State {
    resources: BTreeMap<String, Stored>,
    operations: HashMap<String, String>,
    stuck: HashSet<String>,
    next_operation: u32,
}

#[derive(Debug, Clone)]
pub struct ArmEmulator {
    state: Arc<Mutex<State>>,
    base_uri: String,
}

enum Protocol {
    Immediate,
    Location,
    ResourceState,
    AsyncOperation,
}

fn protocol(type_segment: &str) -> Protocol {
    match type_segment {
        "storageAccounts" => Protocol::Location,
        "virtualNetworks" => Protocol::ResourceState,
        "subnets" | "virtualMachines" => Protocol::AsyncOperation,
        _ => Protocol::Immediate,
    }
}

fn arm_error(status: u16, code: &str, message: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": {"code": code, "message": message.into()}
    }))
}

fn parse_cidr(cidr: &str) -> Option<(u32, u32)> {
    let (addr, len) = cidr.split_once('/')?;
    let addr: Ipv4Addr = addr.parse().ok()?;
    let len: u32 = len.parse().ok()?;
    (len <= 32).then(|| (u32::from(addr), len))
}

fn mask(len: u32) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (32 - len)
    }
}

fn cidr_contains(outer: &str, inner: &str) -> bool {
    match (parse_cidr(outer), parse_cidr(inner)) {
        (Some((o, ol)), Some((i, il))) => il >= ol && (o & mask(ol)) == (i & mask(ol)),
        _ => false,
    }
}

impl ArmEmulator {
    pub async fn start() -> (MockServer, Self) {
        let server = MockServer::start().await;
        // Request URLs seen by a responder lack the port, so operation URLs are built
        // from the server address.
        let emulator = Self {
            state: Arc::default(),
            base_uri: server.uri(),
        };
        Mock::given(any())
            .respond_with(emulator.clone())
            .mount(&server)
            .await;
        (server, emulator)
    }

    /// Keep every resource of this type in progress forever.
    pub fn stick(&self, type_segment: &str) {
        self.lock().stuck.insert(type_segment.to_string());
    }

    pub fn unstick(&self, type_segment: &str) {
        self.lock().stuck.remove(type_segment);
    }

    pub fn resource_count(&self) -> usize {
        self.lock().resources.len()
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().resources.keys().cloned().collect()
    }

    /// True once the resource at `path` reports `Succeeded`.
    pub fn is_settled(&self, path: &str) -> bool {
        self.lock()
            .resources
            .get(path)
            .is_some_and(|stored| stored.polls_left == 0)
    }

    pub fn remove(&self, path: &str) {
        self.lock().resources.remove(path);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn put(&self, request: &Request, path: &str) -> ResponseTemplate {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 4 || segments.len() % 2 != 0 {
            return arm_error(400, "InvalidResourceId", format!("bad path {path}"));
        }
        let type_segment = segments[segments.len() - 2];
        let name = segments[segments.len() - 1].to_string();
        let group_path = format!("/{}", segments[..4].join("/"));

        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return arm_error(400, "InvalidRequestContent", "body is not JSON");
        };

        let mut state = self.lock();

        if type_segment == "resourceGroups" {
            if let Some(existing) = state.resources.get(path) {
                if existing.doc["location"] != body["location"] {
                    return arm_error(
                        409,
                        "InvalidResourceGroupLocation",
                        format!("Invalid resource group location {}.", body["location"]),
                    );
                }
            }
        } else if !state.resources.contains_key(&group_path) {
            return arm_error(
                404,
                "ResourceGroupNotFound",
                format!("Resource group '{}' could not be found.", segments[3]),
            );
        }

        match type_segment {
            "virtualNetworks" => {
                let prefixes = body["properties"]["addressSpace"]["addressPrefixes"]
                    .as_array()
                    .cloned()
                    .unwrap_or_default();
                if prefixes.is_empty()
                    || prefixes
                        .iter()
                        .any(|p| p.as_str().and_then(parse_cidr).is_none())
                {
                    return arm_error(
                        400,
                        "InvalidAddressPrefixFormat",
                        "Address prefix is not formatted correctly.",
                    );
                }
            }
            "subnets" => {
                let vnet_path = path.rsplit_once("/subnets/").map_or("", |(vnet, _)| vnet);
                let Some(vnet) = state.resources.get(vnet_path) else {
                    return arm_error(404, "NotFound", format!("Resource {vnet_path} not found."));
                };
                let prefix = body["properties"]["addressPrefix"].as_str().unwrap_or("");
                let nested = vnet.doc["properties"]["addressSpace"]["addressPrefixes"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .any(|space| cidr_contains(space, prefix));
                if !nested {
                    return arm_error(
                        400,
                        "NetcfgInvalidSubnet",
                        format!("Subnet '{name}' is not valid in its virtual network."),
                    );
                }
            }
            "networkInterfaces" => {
                let subnet_id = body["properties"]["ipConfigurations"][0]["properties"]["subnet"]
                    ["id"]
                    .as_str()
                    .unwrap_or("");
                if !state.resources.contains_key(subnet_id) {
                    return arm_error(
                        400,
                        "InvalidResourceReference",
                        format!("Resource {subnet_id} referenced by resource {path} was not found."),
                    );
                }
            }
            "virtualMachines" => {
                let nic_id = body["properties"]["networkProfile"]["networkInterfaces"][0]["id"]
                    .as_str()
                    .unwrap_or("");
                if !state.resources.contains_key(nic_id) {
                    return arm_error(
                        404,
                        "NotFound",
                        format!("Resource {nic_id} not found."),
                    );
                }
            }
            _ => {}
        }

        let existed = state.resources.contains_key(path);
        let mut doc = body;
        doc["id"] = json!(path);
        doc["name"] = json!(name);
        if let Some(os_profile) = doc
            .pointer_mut("/properties/osProfile")
            .and_then(Value::as_object_mut)
        {
            os_profile.remove("adminPassword");
        }

        let protocol = protocol(type_segment);
        let polls_left = match protocol {
            Protocol::Immediate => 0,
            _ => POLLS_TO_COMPLETE,
        };
        state.resources.insert(
            path.to_string(),
            Stored {
                doc,
                polls_left,
            },
        );

        let status = if existed { 200 } else { 201 };
        match protocol {
            Protocol::Immediate => {
                ResponseTemplate::new(status).set_body_json(Self::render(&state, path))
            }
            Protocol::ResourceState => {
                ResponseTemplate::new(status).set_body_json(Self::render(&state, path))
            }
            Protocol::Location | Protocol::AsyncOperation => {
                state.next_operation += 1;
                let operation_path = format!("/operations/{}", state.next_operation);
                state
                    .operations
                    .insert(operation_path.clone(), path.to_string());

                let operation_url = format!("{}{operation_path}", self.base_uri);

                if matches!(protocol, Protocol::Location) {
                    ResponseTemplate::new(202).insert_header("Location", operation_url.as_str())
                } else {
                    ResponseTemplate::new(status)
                        .insert_header("Azure-AsyncOperation", operation_url.as_str())
                        .set_body_json(Self::render(&state, path))
                }
            }
        }
    }

    fn get(&self, path: &str) -> ResponseTemplate {
        let mut state = self.lock();

        if let Some(target) = state.operations.get(path).cloned() {
            let type_segment = Self::type_segment(&target);
            let stuck = state.stuck.contains(&type_segment);
            let Some(stored) = state.resources.get_mut(&target) else {
                return arm_error(404, "NotFound", "operation target removed");
            };
            if !stuck && stored.polls_left > 0 {
                stored.polls_left -= 1;
            }
            let done = stored.polls_left == 0;
            return match protocol(&type_segment) {
                Protocol::Location if done => {
                    ResponseTemplate::new(200).set_body_json(Self::render(&state, &target))
                }
                Protocol::Location => ResponseTemplate::new(202),
                _ => ResponseTemplate::new(200).set_body_json(json!({
                    "status": if done { "Succeeded" } else { "InProgress" }
                })),
            };
        }

        let type_segment = Self::type_segment(path);
        let stuck = state.stuck.contains(&type_segment);
        match state.resources.get_mut(path) {
            None => arm_error(
                404,
                if type_segment == "resourceGroups" {
                    "ResourceGroupNotFound"
                } else {
                    "ResourceNotFound"
                },
                format!("The Resource '{path}' was not found."),
            ),
            Some(stored) => {
                if matches!(protocol(&type_segment), Protocol::ResourceState)
                    && !stuck
                    && stored.polls_left > 0
                {
                    stored.polls_left -= 1;
                }
                ResponseTemplate::new(200).set_body_json(Self::render(&state, path))
            }
        }
    }

    fn type_segment(path: &str) -> String {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        segments
            .len()
            .checked_sub(2)
            .map(|i| segments[i].to_string())
            .unwrap_or_default()
    }

    fn render(state: &State, path: &str) -> Value {
        let Some(stored) = state.resources.get(path) else {
            return Value::Null;
        };
        let mut doc = stored.doc.clone();
        let provisioning = if stored.polls_left == 0 {
            "Succeeded"
        } else if Self::type_segment(path) == "virtualNetworks" {
            "Updating"
        } else {
            "Creating"
        };
        doc["properties"]["provisioningState"] = json!(provisioning);

        if Self::type_segment(path) == "virtualNetworks" {
            let prefix = format!("{path}/subnets/");
            let subnets: Vec<Value> = state
                .resources
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .map(|(key, _)| Self::render(state, key))
                .collect();
            doc["properties"]["subnets"] = json!(subnets);
        }
        doc
    }
}

impl Respond for ArmEmulator {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let path = request.url.path().trim_end_matches('/').to_string();
        match request.method.as_str() {
            "PUT" => self.put(request, &path),
            "GET" => self.get(&path),
            other => arm_error(405, "MethodNotAllowed", format!("{other} not supported")),
        }
    }
}

pub fn subscription() -> SubscriptionId {
    SubscriptionId::parse_str(SUBSCRIPTION).unwrap()
}

pub fn fast_policy() -> PollPolicy {
    PollPolicy::new()
        .with_interval(Duration::from_millis(10))
        .with_max_wait(Duration::from_secs(5))
}

pub fn provisioner(server: &MockServer) -> Provisioner {
    provisioner_with(server, fast_policy())
}

pub fn provisioner_with(server: &MockServer, policy: PollPolicy) -> Provisioner {
    let session = Arc::new(Session::with_token(subscription(), "test-token", None));
    let config = ProvisionerConfig::new(server.uri()).unwrap();
    ProvisionerBuilder::new(session, config)
        .with_poll_policy(policy)
        .build()
        .unwrap()
}

pub fn group_path(group: &str) -> String {
    format!("/subscriptions/{SUBSCRIPTION}/resourceGroups/{group}")
}

pub fn resource_path(group: &str, namespace: &str, type_segment: &str, name: &str) -> String {
    format!(
        "{}/providers/{namespace}/{type_segment}/{name}",
        group_path(group)
    )
}

/// Method and path of every request the server received, in order.
pub async fn requests(server: &MockServer) -> Vec<(String, String)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| (r.method.to_string(), r.url.path().to_string()))
        .collect()
}
