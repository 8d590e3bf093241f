//! Backend profiles: load/save simple JSON mapping of profile name -> { api_url }
//! Stored as profiles.json in the rigwatch config dir.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::store::{self, StoreError};

const PROFILES_FILE: &str = "profiles.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileEntry {
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    pub version: u32,
}

pub fn load_profiles() -> ProfilesFile {
    store::load_json(PROFILES_FILE).unwrap_or_default()
}

pub fn save_profiles(p: &ProfilesFile) -> Result<(), StoreError> {
    store::save_json(PROFILES_FILE, p)
}

#[derive(Debug, PartialEq)]
pub enum ResolveProfile {
    /// Use the provided runtime URL (not persisted here)
    Direct(String),
    /// Loaded from an existing profile entry
    Loaded(String),
    /// Should prompt user to select among profile names
    PromptSelect(Vec<String>),
    /// Should prompt user to create a new profile (name)
    PromptCreate(String),
    /// No profile could be resolved (e.g., missing arguments)
    None,
}

pub struct ProfileRequest {
    pub profile_name: Option<String>,
    pub api_url: Option<String>,
}

impl ProfileRequest {
    pub fn resolve(self, pf: &ProfilesFile) -> ResolveProfile {
        match (self.profile_name, self.api_url) {
            // URL given (with or without a name) -> direct; the caller may save it
            (_, Some(url)) => ResolveProfile::Direct(url),
            // Only profile name given -> try load
            (Some(name), None) => match pf.profiles.get(&name) {
                Some(entry) => ResolveProfile::Loaded(entry.api_url.clone()),
                None => ResolveProfile::PromptCreate(name),
            },
            // Nothing provided -> maybe prompt select if profiles exist
            (None, None) if pf.profiles.is_empty() => ResolveProfile::None,
            (None, None) => ResolveProfile::PromptSelect(pf.profiles.keys().cloned().collect()),
        }
    }
}

/// Store `url` under `name`. Returns true when the file changed.
pub fn upsert_profile(pf: &mut ProfilesFile, name: &str, url: &str, overwrite: bool) -> bool {
    match pf.profiles.get(name) {
        Some(entry) if entry.api_url == url => false,
        Some(_) if !overwrite => false,
        _ => {
            pf.profiles.insert(
                name.to_string(),
                ProfileEntry {
                    api_url: url.to_string(),
                },
            );
            true
        }
    }
}
