//! Seeded pseudonym pools.
//!
//! Team pseudonyms are `T001`..`T999`. Run pseudonyms are short plant and
//! animal names followed by consonant-vowel-consonant syllables. Both pools
//! are shuffled with independent generators derived from one seed, so the
//! same seed always yields the same issuance order for each kind.

use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};
use veil_model::IdentifierKind;

use crate::error::{MapError, Result};

/// Number of team pseudonyms.
pub const TEAM_POOL_SIZE: usize = 999;

pub const PLANTIMALS: &[&str] = &[
    "ant", "ape", "auk", "bat", "bee", "bug", "cat", "cod", "cow", "cub", "doe", "dog", "eel",
    "elk", "emu", "ewe", "fly", "fox", "gnu", "hen", "hog", "owl", "ox", "pig", "pup", "ram",
    "rat", "ray", "yak", "ash", "elm", "fir", "ivy", "oak", "pea", "pod", "rye", "sap", "soy",
    "tea", "yam", "yew", "bass", "bear", "beet", "bird", "boar", "calf", "clam", "colt", "corn",
    "crab", "crow", "deer", "dill", "duck", "fern", "fig", "frog", "goat", "gull", "hare", "hawk",
    "herb", "ibis", "kale", "kelp", "kite", "lamb", "lark", "leek", "lily", "lime", "lion", "loon",
    "lynx", "mink", "mint", "mite", "mole", "moss", "moth", "newt", "nut", "oats", "okra", "pear",
    "pike", "pine", "plum", "puma", "reed", "rice", "rose", "sage", "seal", "slug", "sole", "swan",
    "tern", "tick", "toad", "tuna", "vole", "wasp", "weed", "wren", "adder", "algae", "anise",
    "aphid", "apple", "aspen", "basil", "birch", "bison", "camel", "cedar", "chard", "cumin",
    "daisy", "eagle", "finch", "gecko", "goose", "grape", "guava", "hazel", "heron", "hyena",
    "koala", "larch", "lemon", "lemur", "llama", "lotus", "mango", "maple", "melon", "moose",
    "olive", "onion", "otter", "panda", "peach", "perch", "poppy", "raven", "robin", "shark",
    "sheep", "skunk", "sloth", "snail", "squid", "stork", "thyme", "tiger", "trout", "tulip",
    "viper", "whale", "zebra", "alpaca", "badger", "bamboo", "beaver", "carrot", "cherry",
    "clover", "cobra", "coyote", "falcon", "ferret", "garlic", "ginger", "gopher", "iguana",
    "jackal", "jaguar", "lentil", "lichen", "locust", "mantis", "marlin", "minnow", "orchid",
    "parrot", "peanut", "pepper", "pigeon", "potato", "rabbit", "radish", "salmon", "sesame",
    "shrimp", "spruce", "squash", "tomato", "turnip", "turtle", "urchin", "walnut", "weasel",
    "willow", "yarrow",
];

const CONSONANTS: &[u8] = b"bcdfghjklmnprstvwxz";
const VOWELS: &[u8] = b"aeiou";

/// Deterministically shuffled pools with issuance cursors.
#[derive(Debug, Clone)]
pub struct PseudonymPool {
    seed: u64,
    teams: Vec<String>,
    runs: Vec<String>,
    team_cursor: usize,
    run_cursor: usize,
}

impl PseudonymPool {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            teams: team_pool(seed),
            runs: run_pool(seed),
            team_cursor: 0,
            run_cursor: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn get_team_pseudonym(&mut self) -> Result<String> {
        take(&self.teams, &mut self.team_cursor, IdentifierKind::Team)
    }

    pub fn get_run_pseudonym(&mut self) -> Result<String> {
        take(&self.runs, &mut self.run_cursor, IdentifierKind::Run)
    }

    pub fn next(&mut self, kind: IdentifierKind) -> Result<String> {
        match kind {
            IdentifierKind::Team => self.get_team_pseudonym(),
            IdentifierKind::Run => self.get_run_pseudonym(),
        }
    }

    pub fn team_cursor(&self) -> usize {
        self.team_cursor
    }

    pub fn run_cursor(&self) -> usize {
        self.run_cursor
    }

    pub fn teams_remaining(&self) -> usize {
        self.teams.len() - self.team_cursor
    }

    pub fn runs_remaining(&self) -> usize {
        self.runs.len() - self.run_cursor
    }

    /// Restores cursors saved by a previous session.
    ///
    /// Cursors never move backwards and never pass the end of their pool.
    pub fn set_indices(&mut self, team_index: usize, run_index: usize) -> Result<()> {
        check_cursor("team_pool_index", team_index, self.team_cursor, self.teams.len())?;
        check_cursor("run_pool_index", run_index, self.run_cursor, self.runs.len())?;
        self.team_cursor = team_index;
        self.run_cursor = run_index;
        Ok(())
    }
}

fn take(pool: &[String], cursor: &mut usize, kind: IdentifierKind) -> Result<String> {
    let name = pool.get(*cursor).cloned().ok_or(MapError::PoolExhausted {
        kind,
        capacity: pool.len(),
    })?;
    *cursor += 1;
    Ok(name)
}

fn check_cursor(key: &str, requested: usize, current: usize, len: usize) -> Result<()> {
    if requested < current || requested > len {
        return Err(MapError::InvalidState {
            key: key.to_string(),
            value: format!("{requested} (current {current}, pool size {len})"),
        });
    }
    Ok(())
}

/// One generator per pool, keyed by the seed and a label.
fn pool_rng(seed: u64, label: &str) -> StdRng {
    let mut hasher = Sha256::new();
    hasher.update(label.as_bytes());
    hasher.update(seed.to_le_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    StdRng::from_seed(bytes)
}

fn team_pool(seed: u64) -> Vec<String> {
    let mut names: Vec<String> = (1..=TEAM_POOL_SIZE).map(|n| format!("T{n:03}")).collect();
    names.shuffle(&mut pool_rng(seed, "team"));
    names
}

fn run_pool(seed: u64) -> Vec<String> {
    let mut rng = pool_rng(seed, "run");
    let mut seen = HashSet::new();
    let mut curated: Vec<String> = PLANTIMALS
        .iter()
        .filter(|name| seen.insert(**name))
        .map(|name| (*name).to_string())
        .collect();
    curated.shuffle(&mut rng);

    let mut syllables: Vec<String> = cvc_names()
        .into_iter()
        .filter(|name| !seen.contains(name.as_str()))
        .collect();
    syllables.shuffle(&mut rng);

    curated.extend(syllables);
    curated
}

fn cvc_names() -> Vec<String> {
    let mut names = Vec::with_capacity(CONSONANTS.len() * VOWELS.len() * CONSONANTS.len());
    for &first in CONSONANTS {
        for &vowel in VOWELS {
            for &last in CONSONANTS {
                names.push(String::from_utf8_lossy(&[first, vowel, last]).into_owned());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn same_seed_same_order() {
        let mut first = PseudonymPool::new(42);
        let mut second = PseudonymPool::new(42);
        for _ in 0..20 {
            assert_eq!(first.get_team_pseudonym().ok(), second.get_team_pseudonym().ok());
            assert_eq!(first.get_run_pseudonym().ok(), second.get_run_pseudonym().ok());
        }
    }

    #[test]
    fn kinds_are_independent() {
        let mut interleaved = PseudonymPool::new(9);
        let mut runs_only = PseudonymPool::new(9);
        interleaved.get_team_pseudonym().expect("team");
        let run = interleaved.get_run_pseudonym().expect("run");
        assert_eq!(Some(run), runs_only.get_run_pseudonym().ok());
    }

    #[test]
    fn curated_names_come_first() {
        let mut pool = PseudonymPool::new(3);
        let curated: HashSet<&str> = PLANTIMALS.iter().copied().collect();
        for _ in 0..curated.len() {
            let name = pool.get_run_pseudonym().expect("run");
            assert!(curated.contains(name.as_str()), "{name} should be curated");
        }
        let fallback = pool.get_run_pseudonym().expect("fallback");
        assert_eq!(fallback.len(), 3);
        assert!(!curated.contains(fallback.as_str()));
    }

    #[test]
    fn team_pool_exhausts() {
        let mut pool = PseudonymPool::new(1);
        let mut seen = HashSet::new();
        for _ in 0..TEAM_POOL_SIZE {
            let name = pool.get_team_pseudonym().expect("team");
            assert!(name.starts_with('T') && name.len() == 4);
            assert!(seen.insert(name));
        }
        assert!(matches!(
            pool.get_team_pseudonym(),
            Err(MapError::PoolExhausted { kind: IdentifierKind::Team, capacity: TEAM_POOL_SIZE })
        ));
    }

    #[test]
    fn restored_cursor_resumes_sequence() {
        let mut original = PseudonymPool::new(11);
        original.get_run_pseudonym().expect("run");
        original.get_run_pseudonym().expect("run");
        let mut restored = PseudonymPool::new(11);
        restored.set_indices(0, 2).expect("restore");
        assert_eq!(original.get_run_pseudonym().ok(), restored.get_run_pseudonym().ok());
    }

    #[test]
    fn cursor_cannot_move_backwards_or_past_end() {
        let mut pool = PseudonymPool::new(5);
        pool.set_indices(3, 3).expect("restore");
        assert!(pool.set_indices(2, 3).is_err());
        assert!(pool.set_indices(TEAM_POOL_SIZE + 1, 3).is_err());
    }

    proptest! {
        #[test]
        fn run_pool_has_no_duplicates(seed in any::<u64>()) {
            let names = run_pool(seed);
            let unique: HashSet<&String> = names.iter().collect();
            prop_assert_eq!(unique.len(), names.len());
        }
    }
}
