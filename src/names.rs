//! Random display names for users who don't pick one

use uuid::Uuid;

const ADJECTIVES: &[&str] = &[
    "Swift", "Quiet", "Bright", "Brave", "Calm", "Clever", "Gentle", "Lucky", "Merry", "Nimble",
    "Sunny", "Witty",
];

const ANIMALS: &[&str] = &[
    "Otter", "Falcon", "Panda", "Heron", "Lynx", "Koala", "Badger", "Robin", "Gecko", "Marten",
    "Ibex", "Wren",
];

/// Non-empty, human-readable, not guaranteed unique
pub fn random_display_name() -> String {
    let id = Uuid::new_v4();
    let bytes = id.as_bytes();

    let adjective = ADJECTIVES[bytes[0] as usize % ADJECTIVES.len()];
    let animal = ANIMALS[bytes[1] as usize % ANIMALS.len()];

    format!("{}{}-{:02x}{:02x}", adjective, animal, bytes[2], bytes[3])
}
