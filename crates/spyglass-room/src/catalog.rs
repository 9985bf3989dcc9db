//! The built-in location catalog.

use spyglass_protocol::{LocationCatalog, LocationPack, ProtocolError};

const CLASSIC: &[&str] = &[
    "Beach",
    "School",
    "Airplane",
    "Casino",
    "Church",
    "Bank",
    "Restaurant",
    "Circus",
    "Hospital",
    "Hotel",
    "Train",
    "Theater",
    "Police Station",
    "Supermarket",
    "University",
    "Military Base",
    "Space Station",
    "Ocean Liner",
    "Construction Site",
    "Library",
];

const METROPOLIS: &[&str] = &[
    "Nightclub",
    "Gym",
    "Rock Concert",
    "Talk Show Studio",
    "Coworking Space",
    "Subway",
    "Barbershop",
    "Shopping Mall",
    "Coffee Shop",
    "Esports Tournament",
    "Fashion Show",
    "Karaoke Bar",
    "Spa",
    "Wedding",
    "Car Repair Shop",
];

const HISTORY: &[&str] = &[
    "Pirate Ship",
    "Knight Tournament",
    "Wild West Saloon",
    "Archaeological Dig",
    "Viking Village",
    "Vampire Ball",
    "Jurassic Park",
    "Colosseum",
    "Pharaoh's Tomb",
    "Titanic",
    "Victorian London",
    "Witches' Sabbath",
    "Ninja Dojo",
    "Fantasy Tavern",
    "Mount Olympus",
];

const EXTREME: &[&str] = &[
    "Nuclear Plant",
    "Polar Station",
    "Prison",
    "Asylum",
    "Cemetery",
    "Survivor Bunker",
    "Mars Colony",
    "Submarine",
    "Summit of Everest",
    "Front Line",
    "Secret Laboratory",
    "Haunted House",
    "Mafia Meeting",
    "Desert Island",
    "Area 51",
];

fn builtin_packs() -> Vec<LocationPack> {
    vec![
        LocationPack::new("Classic", CLASSIC),
        LocationPack::new("Metropolis", METROPOLIS),
        LocationPack::new("History", HISTORY),
        LocationPack::new("Extreme", EXTREME),
    ]
}

/// The four built-in packs. Rooms start with "Classic" active.
pub fn builtin_catalog() -> Result<LocationCatalog, ProtocolError> {
    LocationCatalog::grouped(builtin_packs())
}

/// Every built-in location in a single pack, for hosts who just want a
/// plain list to toggle.
pub fn builtin_flat_catalog() -> Result<LocationCatalog, ProtocolError> {
    let locations = builtin_packs()
        .into_iter()
        .flat_map(|pack| pack.locations)
        .collect();
    LocationCatalog::flat(locations)
}
