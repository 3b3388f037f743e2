//! Anonymous display names.
//!
//! Each chat participant gets a pseudonym at chat creation, shown to the
//! other side until a mutual reveal. Names are drawn from small word lists
//! and are unique enough for display within a single chat; they carry no
//! global uniqueness guarantee.

use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "Amber", "Bold", "Brisk", "Calm", "Clever", "Crimson", "Curious", "Dusky",
    "Gentle", "Hidden", "Ivory", "Jade", "Lively", "Lunar", "Mellow", "Misty",
    "Nimble", "Quiet", "Scarlet", "Silent", "Silver", "Swift", "Velvet", "Wandering",
];

const ANIMALS: &[&str] = &[
    "Badger", "Crane", "Deer", "Falcon", "Fox", "Hare", "Heron", "Ibis",
    "Lynx", "Marten", "Otter", "Owl", "Puffin", "Raven", "Robin", "Seal",
    "Sparrow", "Stoat", "Swan", "Wolf", "Wren",
];

/// Generate one anonymous display name, e.g. `"Misty Otter"`.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let animal = ANIMALS[rng.gen_range(0..ANIMALS.len())];
    format!("{adjective} {animal}")
}

/// Generate a pair of distinct names for the two participants of a chat.
pub fn generate_pair<R: Rng + ?Sized>(rng: &mut R) -> (String, String) {
    let first = generate(rng);
    loop {
        let second = generate(rng);
        if second != first {
            return (first, second);
        }
    }
}

/// [`generate_pair`] with the thread-local RNG.
pub fn random_pair() -> (String, String) {
    generate_pair(&mut rand::thread_rng())
}
