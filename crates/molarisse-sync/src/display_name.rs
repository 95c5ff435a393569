// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partner name resolution.
//!
//! Names are looked up in this order: the session store, the in-memory map,
//! the partner profile endpoint, then the plain user endpoint. The first real
//! (non-placeholder) name found is written to both caches and wins for the
//! rest of the session. Placeholders are never persisted.

use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use molarisse_core::{
    MessagingTransport, PartnerId, PartnerProfile, PartnerRole, SessionStore, WirePartnerInfo,
    WireUserInfo,
};
use regex::Regex;
use tracing::{debug, warn};

use crate::events::{EventBus, SyncEvent};

/// Session store key prefix; the partner id is appended.
pub const SESSION_KEY_PREFIX: &str = "partner_name_";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:user|utilisateur)\s*(?:\d+|undefined|null)?$")
        .expect("placeholder pattern is valid")
});

/// Synthesized name shown until a real one resolves.
pub fn placeholder(partner: PartnerId) -> String {
    format!("Utilisateur {partner}")
}

/// Whether `name` carries no information beyond the partner id.
pub fn is_placeholder(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || PLACEHOLDER.is_match(name)
}

/// Classify a free-form role label. Case-insensitive substring match over
/// French and English synonyms.
pub fn classify_role(raw: Option<&str>) -> PartnerRole {
    let Some(raw) = raw else {
        return PartnerRole::Other;
    };
    let lower = raw.to_lowercase();

    if contains_any(&lower, &["doctor", "medecin", "médecin", "docteur"]) {
        PartnerRole::Doctor
    } else if lower.contains("patient") {
        PartnerRole::Patient
    } else if contains_any(&lower, &["secretary", "secretaire", "secrétaire"]) {
        PartnerRole::Secretary
    } else if lower.contains("admin") {
        PartnerRole::Admin
    } else {
        PartnerRole::Other
    }
}

/// Badge text for a role.
pub fn role_label(role: PartnerRole, raw: Option<&str>) -> String {
    match role {
        PartnerRole::Doctor => "Médecin".to_string(),
        PartnerRole::Patient => "Patient".to_string(),
        PartnerRole::Secretary => "Secrétaire".to_string(),
        PartnerRole::Admin => "Admin".to_string(),
        PartnerRole::Other => raw
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(capitalize)
            .unwrap_or_else(|| "Utilisateur".to_string()),
    }
}

/// Name as shown in headers: doctors get a `Dr. ` title exactly once.
pub fn display_name(name: &str, role: PartnerRole) -> String {
    let name = name.trim();
    if role != PartnerRole::Doctor || is_placeholder(name) {
        return name.to_string();
    }
    let lower = name.to_lowercase();
    if lower.starts_with("dr.") || lower.starts_with("dr ") {
        name.to_string()
    } else {
        format!("Dr. {name}")
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn join_names(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let parts: Vec<&str> = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn first_real(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|n| n.trim().to_string())
        .find(|n| !is_placeholder(n))
}

/// Name from the partner profile shape.
pub fn name_from_partner_info(info: &WirePartnerInfo) -> Option<String> {
    first_real([
        join_names(info.prenom.as_deref(), info.nom.as_deref()),
        info.name.clone(),
        join_names(info.first_name.as_deref(), info.last_name.as_deref()),
        info.partner_name.clone(),
        info.username.clone(),
    ])
}

/// Name from the plain user shape.
pub fn name_from_user_info(info: &WireUserInfo) -> Option<String> {
    first_real([
        join_names(info.prenom.as_deref(), info.nom.as_deref()),
        join_names(info.first_name.as_deref(), info.last_name.as_deref()),
        info.username.clone(),
    ])
}

/// Resolves and remembers partner names for one session.
pub struct DisplayNameResolver {
    transport: Arc<dyn MessagingTransport>,
    session: Arc<dyn SessionStore>,
    memory: DashMap<PartnerId, String>,
    in_flight: DashMap<PartnerId, ()>,
    events: EventBus,
}

impl DisplayNameResolver {
    pub fn new(
        transport: Arc<dyn MessagingTransport>,
        session: Arc<dyn SessionStore>,
        events: EventBus,
    ) -> Self {
        Self {
            transport,
            session,
            memory: DashMap::new(),
            in_flight: DashMap::new(),
            events,
        }
    }

    /// The best known real name, without touching the network.
    pub fn cached(&self, partner: PartnerId) -> Option<String> {
        if let Some(name) = self
            .session
            .get(&session_key(partner))
            .filter(|n| !is_placeholder(n))
        {
            self.memory.entry(partner).or_insert_with(|| name.clone());
            return Some(name);
        }
        self.memory.get(&partner).map(|n| n.value().clone())
    }

    /// Best-effort name, returned immediately.
    ///
    /// On a cache miss this returns the placeholder and starts a background
    /// lookup; its result is announced as [`SyncEvent::PartnerResolved`].
    pub fn resolve(self: &Arc<Self>, partner: PartnerId) -> String {
        if let Some(name) = self.cached(partner) {
            return name;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                if self.in_flight.insert(partner, ()).is_none() {
                    let this = Arc::clone(self);
                    handle.spawn(async move {
                        this.lookup_profile(partner).await;
                        this.in_flight.remove(&partner);
                    });
                }
            }
            Err(_) => debug!(%partner, "no runtime, skipping background name lookup"),
        }
        placeholder(partner)
    }

    /// Record a name seen elsewhere (e.g. an inbox row). Returns `true` if it
    /// became the cached name.
    pub fn remember(&self, partner: PartnerId, name: &str) -> bool {
        let name = name.trim();
        if is_placeholder(name) {
            return false;
        }
        if self.cached(partner).is_some() {
            return false;
        }
        match self.memory.entry(partner) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(slot) => {
                slot.insert(name.to_string());
            }
        }
        self.session.set(&session_key(partner), name);
        debug!(%partner, "partner name cached");
        self.events.publish(SyncEvent::PartnerResolved {
            partner,
            name: name.to_string(),
        });
        true
    }

    /// Full partner metadata. The name comes from the caches when possible;
    /// role and picture always come from the profile lookup.
    pub async fn lookup_profile(&self, partner: PartnerId) -> PartnerProfile {
        let cached = self.cached(partner);

        let info = match self.transport.partner_info(partner).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(%partner, error = %e, "partner lookup failed");
                None
            }
        };

        let mut role_raw = info
            .as_ref()
            .and_then(|i| i.role.as_ref())
            .and_then(|r| r.label())
            .map(str::to_string);
        let mut picture = info
            .as_ref()
            .and_then(|i| i.profile_picture_path.clone().or(i.profile_picture.clone()));
        let mut name = cached.or_else(|| info.as_ref().and_then(name_from_partner_info));

        if name.is_none() {
            match self.transport.user_info(partner).await {
                Ok(user) => {
                    name = name_from_user_info(&user);
                    if role_raw.is_none() {
                        role_raw = user.role.as_ref().and_then(|r| r.label()).map(str::to_string);
                    }
                    if picture.is_none() {
                        picture = user.profile_picture_path;
                    }
                }
                Err(e) => warn!(%partner, error = %e, "user lookup failed"),
            }
        }

        let name = match name {
            Some(name) => {
                self.remember(partner, &name);
                name
            }
            None => placeholder(partner),
        };

        let role = classify_role(role_raw.as_deref());
        PartnerProfile {
            id: partner,
            name,
            role,
            role_label: role_label(role, role_raw.as_deref()),
            profile_picture: picture.filter(|p| !p.trim().is_empty()),
        }
    }
}

fn session_key(partner: PartnerId) -> String {
    format!("{SESSION_KEY_PREFIX}{partner}")
}

#[cfg(test)]
mod tests {
    use molarisse_core::WireRole;

    use super::*;

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("   "));
        assert!(is_placeholder("User 12"));
        assert!(is_placeholder("Utilisateur 12"));
        assert!(is_placeholder("User undefined"));
        assert!(is_placeholder("user 12"));
        assert!(is_placeholder("UTILISATEUR 7"));
        assert!(is_placeholder("User12"));
        assert!(is_placeholder("User"));
        assert!(!is_placeholder("Userine Dupont"));
        assert!(!is_placeholder("Sami Trabelsi"));
        assert_eq!(placeholder(PartnerId(5)), "Utilisateur 5");
        assert!(is_placeholder(&placeholder(PartnerId(5))));
    }

    #[test]
    fn role_synonyms() {
        assert_eq!(classify_role(Some("DOCTOR")), PartnerRole::Doctor);
        assert_eq!(classify_role(Some("Médecin dentiste")), PartnerRole::Doctor);
        assert_eq!(classify_role(Some("docteur")), PartnerRole::Doctor);
        assert_eq!(classify_role(Some("PATIENT")), PartnerRole::Patient);
        assert_eq!(classify_role(Some("Secrétaire")), PartnerRole::Secretary);
        assert_eq!(classify_role(Some("secretaire")), PartnerRole::Secretary);
        assert_eq!(classify_role(Some("ROLE_ADMINISTRATOR")), PartnerRole::Admin);
        assert_eq!(classify_role(Some("nurse")), PartnerRole::Other);
        assert_eq!(classify_role(None), PartnerRole::Other);
    }

    #[test]
    fn role_labels() {
        assert_eq!(role_label(PartnerRole::Doctor, Some("doctor")), "Médecin");
        assert_eq!(role_label(PartnerRole::Other, Some("NURSE")), "Nurse");
        assert_eq!(role_label(PartnerRole::Other, None), "Utilisateur");
    }

    #[test]
    fn doctor_title_added_once() {
        assert_eq!(display_name("Leila Ben Amor", PartnerRole::Doctor), "Dr. Leila Ben Amor");
        assert_eq!(display_name("Dr. Leila", PartnerRole::Doctor), "Dr. Leila");
        assert_eq!(display_name("dr Leila", PartnerRole::Doctor), "dr Leila");
        assert_eq!(display_name("Leila", PartnerRole::Patient), "Leila");
        assert_eq!(display_name("Utilisateur 3", PartnerRole::Doctor), "Utilisateur 3");
    }

    #[test]
    fn partner_info_chain_order() {
        let mut info = WirePartnerInfo {
            nom: Some("Benali".into()),
            prenom: Some("Amina".into()),
            name: Some("A. Benali".into()),
            ..Default::default()
        };
        assert_eq!(name_from_partner_info(&info).as_deref(), Some("Amina Benali"));

        info.nom = None;
        info.prenom = None;
        assert_eq!(name_from_partner_info(&info).as_deref(), Some("A. Benali"));

        info.name = Some("User 9".into());
        info.first_name = Some("Amina".into());
        info.last_name = Some("B".into());
        assert_eq!(name_from_partner_info(&info).as_deref(), Some("Amina B"));

        let only_username = WirePartnerInfo {
            partner_name: Some("User 9".into()),
            username: Some("amina.b".into()),
            role: Some(WireRole::Name("PATIENT".into())),
            ..Default::default()
        };
        assert_eq!(name_from_partner_info(&only_username).as_deref(), Some("amina.b"));

        assert_eq!(name_from_partner_info(&WirePartnerInfo::default()), None);
    }

    #[test]
    fn user_info_chain() {
        let info = WireUserInfo {
            nom: Some("Haddad".into()),
            prenom: Some("Karim".into()),
            username: Some("karim".into()),
            ..Default::default()
        };
        assert_eq!(name_from_user_info(&info).as_deref(), Some("Karim Haddad"));
        let partial = WireUserInfo {
            nom: Some("Haddad".into()),
            ..Default::default()
        };
        assert_eq!(name_from_user_info(&partial).as_deref(), Some("Haddad"));
    }
}
