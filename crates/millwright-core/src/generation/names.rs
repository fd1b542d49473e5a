//! Name generation utilities

use crate::components::Name;
use rand::seq::SliceRandom;
use rand::Rng;

/// Pick a random settler name
pub fn generate_name(rng: &mut impl Rng) -> Name {
    let given = GIVEN_NAMES.choose(rng).copied().unwrap_or("Ada");
    let family = FAMILY_NAMES.choose(rng).copied().unwrap_or("Miller");

    Name::new(given, family)
}

static GIVEN_NAMES: &[&str] = &[
    "Agnes", "Aldous", "Alys", "Ansel", "Beatrix", "Bertram", "Brida", "Cecily", "Cuthbert", "Dorran",
    "Edda", "Edmund", "Elric", "Emma", "Fenna", "Galen", "Gisela", "Godric", "Hawise", "Hugh", "Ida",
    "Isolde", "Jocelyn", "Kasimir", "Linnea", "Lorcan", "Mabel", "Matthias", "Nell", "Osric", "Perrin",
    "Petra", "Quinn", "Rowan", "Sabine", "Sigrun", "Tamsin", "Tobias", "Ulric", "Wynn", "Yara",
];

// Trade surnames, fitting a settlement that names people after their work.
static FAMILY_NAMES: &[&str] = &[
    "Archer", "Baker", "Brewer", "Carter", "Chandler", "Cooper", "Fletcher", "Fowler", "Fuller",
    "Glover", "Hayward", "Hunter", "Mason", "Miller", "Potter", "Reeve", "Sawyer", "Shepherd", "Slater",
    "Smith", "Thatcher", "Tanner", "Turner", "Wainwright", "Weaver", "Woodward", "Wright",
];

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_generate_name() {
        let mut rng = StdRng::seed_from_u64(1);
        let name = generate_name(&mut rng);

        assert!(!name.given.is_empty());
        assert!(!name.family.is_empty());
    }

    #[test]
    fn test_names_repeat_for_seed() {
        let first: Vec<String> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..10).map(|_| generate_name(&mut rng).full_name()).collect()
        };
        let second: Vec<String> = {
            let mut rng = StdRng::seed_from_u64(42);
            (0..10).map(|_| generate_name(&mut rng).full_name()).collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_name_variety() {
        let mut rng = StdRng::seed_from_u64(7);
        let names: Vec<Name> = (0..100).map(|_| generate_name(&mut rng)).collect();

        let unique_given: std::collections::HashSet<_> = names.iter().map(|n| &n.given).collect();
        let unique_family: std::collections::HashSet<_> = names.iter().map(|n| &n.family).collect();

        assert!(unique_given.len() > 10);
        assert!(unique_family.len() > 10);
    }
}
