// Status aggregation.
//
// One poll queries a fixed, ordered set of DAL sub-resources, tolerates
// per-sub-resource failures, reshapes the traffic payload, and flattens
// the merged result into dotted-key scalar pairs. Session faults abort
// the pass; the retry layer decides how to recover.

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Error;
use crate::session::SessionManager;

/// Raw aggregation result: logical group name to sub-resource payload,
/// in query order. Kept as the most recent `last_status_data` for
/// diagnostics export.
pub type RawStatus = Map<String, Value>;

/// The sub-resources queried per poll, in priority order, with the
/// logical group each lands under in the merged record.
pub(crate) const STATUS_ENDPOINTS: &[(&str, &str)] = &[
    ("cellwan_status", "cellular"),
    ("Traffic_Status", "traffic"),
    ("cardpage_status", "cardpage"),
    ("lan", "lan"),
    ("lanhosts", "lanhosts"),
    ("wifi_easy_mesh", "wifi_mesh"),
    ("one_connect", "one_connect"),
    ("cellwan_sms", "sms"),
    ("status", "device"),
];

const TRAFFIC_OID: &str = "Traffic_Status";

/// OID carrying generic device info, used to backfill the `device` group.
pub(crate) const DEVICE_INFO_OID: &str = "status";

/// Superset of OIDs worth probing for availability diagnostics. Not all
/// firmware exposes all of them.
pub(crate) const PROBE_OIDS: &[&str] = &[
    "cellwan_status",
    "cellwan_sms",
    "Traffic_Status",
    "cardpage_status",
    "lan",
    "lanhosts",
    "wifi_easy_mesh",
    "one_connect",
    "status",
    "paren_ctl",
    "wlan_status",
    "eth_status",
];

/// One aggregation pass over all sub-resources.
///
/// Returns `Ok(None)` when zero sub-resources succeeded (the pass failed
/// but may be retried). Session faults, server faults, and decryption
/// failures abort the remaining sub-resources and propagate; transport
/// and plain HTTP errors only omit the affected sub-resource.
pub(crate) async fn run_pass(session: &mut SessionManager) -> Result<Option<RawStatus>, Error> {
    // Log in up front if needed, so a login failure is never mistaken
    // for an omittable per-sub-resource error.
    session.ensure_session().await?;

    let mut merged = RawStatus::new();
    for &(oid, group) in STATUS_ENDPOINTS {
        match session.get_object(oid).await {
            Ok(Some(data)) => {
                let data = if oid == TRAFFIC_OID { reshape_traffic(&data) } else { data };
                merged.insert(group.to_owned(), data);
            }
            Ok(None) => {
                debug!(oid, "sub-resource empty, omitted");
            }
            Err(e) if e.is_endpoint_transient() => {
                debug!(oid, "sub-resource failed, omitted: {e}");
            }
            // 401/500/decryption: a single session fault invalidates the
            // calls that would follow.
            Err(e) => return Err(e),
        }
    }

    if merged.is_empty() {
        Ok(None)
    } else {
        Ok(Some(merged))
    }
}

/// Probe which OIDs answer with data on this device.
pub(crate) async fn probe(session: &mut SessionManager) -> Result<Vec<&'static str>, Error> {
    session.ensure_session().await?;

    let mut available = Vec::new();
    for &oid in PROBE_OIDS {
        if let Ok(Some(_)) = session.get_object(oid).await {
            available.push(oid);
        }
    }
    Ok(available)
}

/// Reshape the traffic payload: zip the parallel `ipIface` and
/// `ipIfaceSt` sequences by position and re-key each statistics entry by
/// its interface name. Entries without a name are dropped.
pub(crate) fn reshape_traffic(raw: &Value) -> Value {
    let mut out = Map::new();
    if let (Some(ifaces), Some(stats)) = (
        raw.get("ipIface").and_then(Value::as_array),
        raw.get("ipIfaceSt").and_then(Value::as_array),
    ) {
        for (iface, stat) in ifaces.iter().zip(stats) {
            let name = iface
                .get("X_ZYXEL_IfName")
                .and_then(Value::as_str)
                .unwrap_or("");
            if !name.is_empty() {
                out.insert(name.to_owned(), stat.clone());
            }
        }
    }
    Value::Object(out)
}

/// Reorder a merged record so the `device` group comes first. Consumers
/// rely on device identity fields being available before everything
/// else.
pub(crate) fn device_first(raw: RawStatus) -> RawStatus {
    if !raw.contains_key("device") {
        return raw;
    }
    let mut ordered = RawStatus::new();
    if let Some(device) = raw.get("device") {
        ordered.insert("device".to_owned(), device.clone());
    }
    for (group, data) in raw {
        if group != "device" {
            ordered.insert(group, data);
        }
    }
    ordered
}

/// Flattened status snapshot: dotted key paths to scalar leaves, in
/// insertion order with `device.*` keys first. Produced fresh each poll;
/// replaces the previous record atomically.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct StatusRecord {
    values: Map<String, Value>,
}

impl StatusRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `true` if any key belongs to the given group (`group.` prefix).
    pub fn has_group(&self, group: &str) -> bool {
        let prefix = format!("{group}.");
        self.values.keys().any(|k| k.starts_with(&prefix))
    }
}

/// Flatten a nested mapping into dotted-path keys. Only mappings recurse;
/// arrays and scalars are leaves.
pub(crate) fn flatten(raw: &RawStatus) -> StatusRecord {
    let mut values = Map::new();
    for (key, value) in raw {
        flatten_into(key, value, &mut values);
    }
    StatusRecord { values }
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(&format!("{prefix}.{key}"), nested, out);
            }
        }
        leaf => {
            out.insert(prefix.to_owned(), leaf.clone());
        }
    }
}
