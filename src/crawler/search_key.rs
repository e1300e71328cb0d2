//! Search key space: the Cartesian product of crawl dimensions.
//!
//! Each key gets a dense origin index in generation order, assigned before
//! the optional seeded shuffle. The origin index travels with the key and is
//! what progress checkpoints refer to; it is never renumbered.

use crate::config::CrawlerSettings;

use super::shuffle::shuffle;

/// Japanese data centers and their worlds.
pub const DATA_CENTERS: [(&str, [&str; 8]); 4] = [
    (
        "Elemental",
        [
            "Aegis", "Atomos", "Carbuncle", "Garuda", "Gungnir", "Kujata", "Tonberry", "Typhon",
        ],
    ),
    (
        "Gaia",
        [
            "Alexander", "Bahamut", "Durandal", "Fenrir", "Ifrit", "Ridill", "Tiamat", "Ultima",
        ],
    ),
    (
        "Mana",
        [
            "Anima", "Asura", "Chocobo", "Hades", "Ixion", "Masamune", "Pandaemonium", "Titan",
        ],
    ),
    (
        "Meteor",
        [
            "Belias", "Mandragora", "Ramuh", "Shinryu", "Unicorn", "Valefor", "Yojimbo", "Zeromus",
        ],
    ),
];

/// All 32 Japanese worlds, in data center order.
pub fn all_jp_worlds() -> Vec<&'static str> {
    DATA_CENTERS
        .iter()
        .flat_map(|(_, worlds)| worlds.iter().copied())
        .collect()
}

/// Class/job ids searched: crafters and gatherers (8-18) plus all combat
/// jobs. Base classes and the limited job are excluded. 32 total.
pub const CLASSJOBS: [u32; 32] = [
    8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, // crafters and gatherers
    19, 20, 21, 22, 23, 24, 25, 27, 28, 30, 31, 32, 33, 34, 35, 37, 38, 39, 40, 41, 42,
];

/// The 16 race tribe search values.
pub const RACE_TRIBES: [&str; 16] = [
    "tribe_1", "tribe_2", "tribe_3", "tribe_4", "tribe_5", "tribe_6", "tribe_7", "tribe_8",
    "tribe_9", "tribe_10", "tribe_11", "tribe_12", "tribe_13", "tribe_14", "tribe_15", "tribe_16",
];

/// Grand company ids.
pub const GC_IDS: [u32; 3] = [1, 2, 3];

const SEARCH_BASE_URL: &str = "https://jp.finalfantasyxiv.com/lodestone/character/";

/// One point in the combinatorial search space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchKey {
    /// Dense index assigned at generation time, before any shuffle.
    pub origin_index: usize,
    pub world: String,
    pub classjob: u32,
    pub race_tribe: String,
    pub gc_id: u32,
}

impl std::fmt::Display for SearchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / job:{} / {} / gc:{}",
            self.world, self.classjob, self.race_tribe, self.gc_id
        )
    }
}

/// Resolve the world scope from settings: explicit worlds win, then a data
/// center name, then the default single-world scope.
pub fn resolve_worlds(settings: &CrawlerSettings) -> Vec<String> {
    if !settings.worlds.is_empty() {
        return settings.worlds.clone();
    }
    if let Some(dc) = &settings.data_center {
        if let Some((_, worlds)) = DATA_CENTERS.iter().find(|(name, _)| name == dc) {
            return worlds.iter().map(|w| (*w).to_string()).collect();
        }
    }
    vec!["Tiamat".to_string()]
}

/// Generates the full key sequence for one run configuration.
#[derive(Debug, Clone)]
pub struct SearchKeySpace {
    worlds: Vec<String>,
    seed: u32,
}

impl SearchKeySpace {
    pub fn new(worlds: Vec<String>, seed: u32) -> Self {
        Self { worlds, seed }
    }

    pub fn from_settings(settings: &CrawlerSettings) -> Self {
        Self::new(resolve_worlds(settings), settings.seed)
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Product size without materializing keys.
    pub fn total_count(&self) -> usize {
        self.worlds.len() * CLASSJOBS.len() * RACE_TRIBES.len() * GC_IDS.len()
    }

    /// Generate every key, tag origin indices in generation order, then
    /// shuffle the sequence with the configured seed. Two calls with the
    /// same configuration yield identical sequences.
    pub fn generate_all(&self) -> Vec<SearchKey> {
        let mut keys = Vec::with_capacity(self.total_count());
        let mut origin_index = 0;
        for world in &self.worlds {
            for &classjob in &CLASSJOBS {
                for tribe in &RACE_TRIBES {
                    for &gc_id in &GC_IDS {
                        keys.push(SearchKey {
                            origin_index,
                            world: world.clone(),
                            classjob,
                            race_tribe: (*tribe).to_string(),
                            gc_id,
                        });
                        origin_index += 1;
                    }
                }
            }
        }
        shuffle(&mut keys, self.seed);
        keys
    }
}

/// Build the listing URL for a key. Page 1 carries no page parameter.
pub fn build_search_url(key: &SearchKey, page: Option<u32>) -> String {
    let mut url = format!(
        "{SEARCH_BASE_URL}?q=&worldname={}&classjob={}&race_tribe={}&gcid={}&order=7",
        key.world, key.classjob, key.race_tribe, key.gc_id
    );
    if let Some(page) = page {
        url.push_str(&format!("&page={page}"));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_space() -> SearchKeySpace {
        SearchKeySpace::new(vec!["Tiamat".to_string()], crate::config::DEFAULT_SEED)
    }

    #[test]
    fn default_scope_has_1536_keys() {
        let space = default_space();
        assert_eq!(space.total_count(), 1536);
        assert_eq!(space.generate_all().len(), 1536);
    }

    #[test]
    fn origin_indices_are_dense_after_shuffle() {
        let keys = default_space().generate_all();
        let mut indices: Vec<usize> = keys.iter().map(|k| k.origin_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..1536).collect::<Vec<_>>());
    }

    #[test]
    fn sequence_is_shuffled() {
        let keys = default_space().generate_all();
        assert_ne!(keys[0].origin_index, 0);
    }

    #[test]
    fn same_seed_reproduces_sequence() {
        let a = default_space().generate_all();
        let b = default_space().generate_all();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_reorder() {
        let a = SearchKeySpace::new(vec!["Tiamat".to_string()], 42).generate_all();
        let b = SearchKeySpace::new(vec!["Tiamat".to_string()], 123).generate_all();
        let first10_a: Vec<usize> = a.iter().take(10).map(|k| k.origin_index).collect();
        let first10_b: Vec<usize> = b.iter().take(10).map(|k| k.origin_index).collect();
        assert_ne!(first10_a, first10_b);
    }

    #[test]
    fn data_center_scope_multiplies_worlds() {
        let settings = crate::config::CrawlerSettings {
            data_center: Some("Gaia".to_string()),
            ..Default::default()
        };
        let space = SearchKeySpace::from_settings(&settings);
        assert_eq!(space.total_count(), 8 * 32 * 16 * 3);
        let keys = space.generate_all();
        let worlds: std::collections::HashSet<&str> =
            keys.iter().map(|k| k.world.as_str()).collect();
        assert!(worlds.contains("Tiamat"));
        assert!(worlds.contains("Bahamut"));
        assert_eq!(worlds.len(), 8);
    }

    #[test]
    fn there_are_32_jp_worlds_and_32_jobs() {
        assert_eq!(all_jp_worlds().len(), 32);
        assert_eq!(CLASSJOBS.len(), 32);
        assert!(CLASSJOBS.contains(&19));
        assert!(CLASSJOBS.contains(&8));
        assert!(CLASSJOBS.contains(&16));
    }

    #[test]
    fn search_url_shape() {
        let key = SearchKey {
            origin_index: 0,
            world: "Tiamat".to_string(),
            classjob: 19,
            race_tribe: "tribe_1".to_string(),
            gc_id: 1,
        };
        assert_eq!(
            build_search_url(&key, None),
            "https://jp.finalfantasyxiv.com/lodestone/character/?q=&worldname=Tiamat&classjob=19&race_tribe=tribe_1&gcid=1&order=7"
        );
        assert!(build_search_url(&key, Some(2)).ends_with("&page=2"));
    }
}
