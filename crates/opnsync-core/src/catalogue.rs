// ── Kind catalogue ──
//
// Every kind the engine knows how to reconcile. `KINDS` is ordered so
// that a kind only references kinds listed before it; creates and
// updates run in this order, deletes in reverse.

use crate::model::{
    Cardinality, IdentifierSource, KindDescriptor, RefLookup, RelationField, ReloadEndpoint, Shape,
};

// ── Reload endpoints ─────────────────────────────────────────────────

pub static HAPROXY_RELOAD: ReloadEndpoint = ReloadEndpoint {
    domain: "haproxy",
    path: "haproxy/service/reconfigure",
    status_field: "status",
    expected: "ok",
};

pub static ZABBIX_AGENT_RELOAD: ReloadEndpoint = ReloadEndpoint {
    domain: "zabbixagent",
    path: "zabbixagent/service/reconfigure",
    status_field: "status",
    expected: "ok",
};

pub static ZABBIX_PROXY_RELOAD: ReloadEndpoint = ReloadEndpoint {
    domain: "zabbixproxy",
    path: "zabbixproxy/service/reconfigure",
    status_field: "status",
    expected: "ok",
};

// ── HAProxy ──────────────────────────────────────────────────────────

pub static HAPROXY_SERVER: KindDescriptor = KindDescriptor {
    name: "haproxy_server",
    description: "HAProxy real server",
    shape: Shape::Collection,
    list_path: "haproxy/settings/searchServers",
    fetch_path: Some("haproxy/settings/getServer"),
    detail_fetch: false,
    add_path: Some("haproxy/settings/addServer"),
    set_path: "haproxy/settings/setServer",
    del_path: Some("haproxy/settings/delServer"),
    payload_key: "server",
    status_field: "result",
    id_field: "uuid",
    ref_field: "uuid",
    name_field: "name",
    identifier: IdentifierSource::Direct,
    relations: &[],
    reload: Some(&HAPROXY_RELOAD),
};

pub static HAPROXY_ACL: KindDescriptor = KindDescriptor {
    name: "haproxy_acl",
    description: "HAProxy condition (ACL)",
    shape: Shape::Collection,
    list_path: "haproxy/settings/searchAcls",
    fetch_path: Some("haproxy/settings/getAcl"),
    detail_fetch: false,
    add_path: Some("haproxy/settings/addAcl"),
    set_path: "haproxy/settings/setAcl",
    del_path: Some("haproxy/settings/delAcl"),
    payload_key: "acl",
    status_field: "result",
    id_field: "uuid",
    ref_field: "uuid",
    name_field: "name",
    identifier: IdentifierSource::Direct,
    relations: &[],
    reload: Some(&HAPROXY_RELOAD),
};

static BACKEND_RELATIONS: [RelationField; 1] = [RelationField {
    field: "linkedServers",
    target: &HAPROXY_SERVER,
    cardinality: Cardinality::Multiple,
}];

pub static HAPROXY_BACKEND: KindDescriptor = KindDescriptor {
    name: "haproxy_backend",
    description: "HAProxy backend pool",
    shape: Shape::Collection,
    list_path: "haproxy/settings/searchBackends",
    fetch_path: Some("haproxy/settings/getBackend"),
    detail_fetch: false,
    add_path: Some("haproxy/settings/addBackend"),
    set_path: "haproxy/settings/setBackend",
    del_path: Some("haproxy/settings/delBackend"),
    payload_key: "backend",
    status_field: "result",
    id_field: "uuid",
    ref_field: "uuid",
    name_field: "name",
    identifier: IdentifierSource::Direct,
    relations: &BACKEND_RELATIONS,
    reload: Some(&HAPROXY_RELOAD),
};

static ACTION_RELATIONS: [RelationField; 3] = [
    RelationField {
        field: "linkedAcls",
        target: &HAPROXY_ACL,
        cardinality: Cardinality::Multiple,
    },
    RelationField {
        field: "use_backend",
        target: &HAPROXY_BACKEND,
        cardinality: Cardinality::Single,
    },
    RelationField {
        field: "use_server",
        target: &HAPROXY_SERVER,
        cardinality: Cardinality::Single,
    },
];

pub static HAPROXY_ACTION: KindDescriptor = KindDescriptor {
    name: "haproxy_action",
    description: "HAProxy rule (action)",
    shape: Shape::Collection,
    list_path: "haproxy/settings/searchActions",
    fetch_path: Some("haproxy/settings/getAction"),
    detail_fetch: false,
    add_path: Some("haproxy/settings/addAction"),
    set_path: "haproxy/settings/setAction",
    del_path: Some("haproxy/settings/delAction"),
    payload_key: "action",
    status_field: "result",
    id_field: "uuid",
    ref_field: "uuid",
    name_field: "name",
    identifier: IdentifierSource::Direct,
    relations: &ACTION_RELATIONS,
    reload: Some(&HAPROXY_RELOAD),
};

static FRONTEND_RELATIONS: [RelationField; 2] = [
    RelationField {
        field: "defaultBackend",
        target: &HAPROXY_BACKEND,
        cardinality: Cardinality::Single,
    },
    RelationField {
        field: "linkedActions",
        target: &HAPROXY_ACTION,
        cardinality: Cardinality::Multiple,
    },
];

pub static HAPROXY_FRONTEND: KindDescriptor = KindDescriptor {
    name: "haproxy_frontend",
    description: "HAProxy public service (frontend)",
    shape: Shape::Collection,
    list_path: "haproxy/settings/searchFrontends",
    fetch_path: Some("haproxy/settings/getFrontend"),
    detail_fetch: false,
    add_path: Some("haproxy/settings/addFrontend"),
    set_path: "haproxy/settings/setFrontend",
    del_path: Some("haproxy/settings/delFrontend"),
    payload_key: "frontend",
    status_field: "result",
    id_field: "uuid",
    ref_field: "uuid",
    name_field: "name",
    identifier: IdentifierSource::Direct,
    relations: &FRONTEND_RELATIONS,
    reload: Some(&HAPROXY_RELOAD),
};

// ── Trust ────────────────────────────────────────────────────────────

pub static TRUST_CA: KindDescriptor = KindDescriptor {
    name: "trust_ca",
    description: "Certificate authority",
    shape: Shape::Collection,
    list_path: "trust/ca/search",
    fetch_path: Some("trust/ca/get"),
    detail_fetch: false,
    add_path: Some("trust/ca/add"),
    set_path: "trust/ca/set",
    del_path: Some("trust/ca/del"),
    payload_key: "ca",
    status_field: "result",
    id_field: "uuid",
    ref_field: "refid",
    name_field: "descr",
    identifier: IdentifierSource::Direct,
    relations: &[],
    reload: None,
};

static CERT_RELATIONS: [RelationField; 1] = [RelationField {
    field: "caref",
    target: &TRUST_CA,
    cardinality: Cardinality::Single,
}];

pub static TRUST_CERT: KindDescriptor = KindDescriptor {
    name: "trust_cert",
    description: "Certificate",
    shape: Shape::Collection,
    list_path: "trust/cert/search",
    fetch_path: Some("trust/cert/get"),
    detail_fetch: false,
    add_path: Some("trust/cert/add"),
    set_path: "trust/cert/set",
    del_path: Some("trust/cert/del"),
    payload_key: "cert",
    status_field: "result",
    id_field: "uuid",
    ref_field: "refid",
    name_field: "descr",
    identifier: IdentifierSource::Direct,
    relations: &CERT_RELATIONS,
    reload: None,
};

/// Revocation lists hang off their CA: the identifier is the CA's `refid`,
/// found by searching CAs for the resource name.
pub static TRUST_CRL: KindDescriptor = KindDescriptor {
    name: "trust_crl",
    description: "Certificate revocation list (one per CA)",
    shape: Shape::Collection,
    list_path: "trust/crl/search",
    fetch_path: Some("trust/crl/get"),
    detail_fetch: true,
    add_path: None,
    set_path: "trust/crl/set",
    del_path: Some("trust/crl/del"),
    payload_key: "crl",
    status_field: "status",
    id_field: "refid",
    ref_field: "refid",
    name_field: "descr",
    identifier: IdentifierSource::Lookup(RefLookup {
        via: &TRUST_CA,
        match_field: "descr",
        ref_field: "refid",
    }),
    relations: &[],
    reload: None,
};

// ── Zabbix ───────────────────────────────────────────────────────────

pub static ZABBIX_AGENT: KindDescriptor = KindDescriptor {
    name: "zabbix_agent",
    description: "Zabbix agent settings",
    shape: Shape::Settings,
    list_path: "zabbixagent/settings/get",
    fetch_path: None,
    detail_fetch: false,
    add_path: None,
    set_path: "zabbixagent/settings/set",
    del_path: None,
    payload_key: "zabbixagent",
    status_field: "result",
    id_field: "",
    ref_field: "",
    name_field: "",
    identifier: IdentifierSource::Direct,
    relations: &[],
    reload: Some(&ZABBIX_AGENT_RELOAD),
};

pub static ZABBIX_PROXY: KindDescriptor = KindDescriptor {
    name: "zabbix_proxy",
    description: "Zabbix proxy settings",
    shape: Shape::Settings,
    list_path: "zabbixproxy/general/get",
    fetch_path: None,
    detail_fetch: false,
    add_path: None,
    set_path: "zabbixproxy/general/set",
    del_path: None,
    payload_key: "general",
    status_field: "result",
    id_field: "",
    ref_field: "",
    name_field: "",
    identifier: IdentifierSource::Direct,
    relations: &[],
    reload: Some(&ZABBIX_PROXY_RELOAD),
};

// ── Lookup ───────────────────────────────────────────────────────────

/// All kinds in dependency order.
pub static KINDS: [&KindDescriptor; 10] = [
    &HAPROXY_SERVER,
    &HAPROXY_ACL,
    &HAPROXY_BACKEND,
    &HAPROXY_ACTION,
    &HAPROXY_FRONTEND,
    &TRUST_CA,
    &TRUST_CERT,
    &TRUST_CRL,
    &ZABBIX_AGENT,
    &ZABBIX_PROXY,
];

/// Find a kind by name.
pub fn lookup(name: &str) -> Option<&'static KindDescriptor> {
    KINDS.iter().copied().find(|k| k.name == name)
}

/// Position of a kind in dependency order (unknown kinds sort last).
pub fn order_of(kind: &KindDescriptor) -> usize {
    KINDS
        .iter()
        .position(|k| k.name == kind.name)
        .unwrap_or(KINDS.len())
}
