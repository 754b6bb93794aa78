//! The built-in card set. Validated as a whole by `Catalog::load`.

use super::{Ability, CardDef, Faction};

fn def(
    id: &str,
    name: &str,
    faction: Faction,
    level: u8,
    soldiers: u32,
    ability: Option<Ability>,
    flavor: &str,
) -> CardDef {
    CardDef {
        id: id.to_string(),
        name: name.to_string(),
        faction,
        level,
        soldiers,
        ability,
        flavor: flavor.to_string(),
    }
}

/// Every card the game ships with. Both factions, levels 1-5, all seven
/// abilities represented plus plain cards.
pub fn builtin_cards() -> Vec<CardDef> {
    use Ability::*;
    use Faction::{East, West};

    vec![
        // ---- West ----
        def(
            "west_shield_levy",
            "Shield Levy",
            West,
            1,
            450,
            None,
            "Farmhands with round shields and a week of drill.",
        ),
        def(
            "west_pike_militia",
            "Pike Militia",
            West,
            1,
            520,
            Some(Reinforcement),
            "They hold the line best when the enemy comes to them.",
        ),
        def(
            "west_border_scouts",
            "Border Scouts",
            West,
            2,
            760,
            Some(FirstStrike),
            "By the time you see them, the first arrows have landed.",
        ),
        def(
            "west_ram_crews",
            "Ram Crews",
            West,
            2,
            800,
            Some(Siege),
            "Gates are a suggestion.",
        ),
        def(
            "west_highland_guard",
            "Highland Guard",
            West,
            3,
            1050,
            Some(Endurance),
            "Outnumbered is how they prefer it.",
        ),
        def(
            "west_longbow_line",
            "Longbow Line",
            West,
            3,
            1150,
            Some(Precision),
            "Every shaft finds a seam in the armor.",
        ),
        def(
            "west_oath_sworn",
            "Oath-Sworn",
            West,
            3,
            1100,
            Some(LastStand),
            "Their vow does not mention dying.",
        ),
        def(
            "west_siege_towers",
            "Siege Towers",
            West,
            4,
            1500,
            Some(Siege),
            "Rolling castles with grudges.",
        ),
        def(
            "west_royal_lancers",
            "Royal Lancers",
            West,
            4,
            1600,
            Some(FirstStrike),
            "The charge is over before the trumpet finishes.",
        ),
        def(
            "west_grey_wardens",
            "Grey Wardens",
            West,
            4,
            1550,
            Some(PartingBlow),
            "Even their dead keep a blade ready.",
        ),
        def(
            "west_marshal_aldric",
            "Marshal Aldric",
            West,
            5,
            2200,
            Some(Precision),
            "He has never wasted a soldier or a sentence.",
        ),
        def(
            "west_queens_vanguard",
            "Queen's Vanguard",
            West,
            5,
            2400,
            Some(Endurance),
            "The bigger the foe, the straighter they stand.",
        ),
        // ---- East ----
        def(
            "east_spear_levy",
            "Spear Levy",
            East,
            1,
            470,
            None,
            "A wall of points and nervous courage.",
        ),
        def(
            "east_dune_archers",
            "Dune Archers",
            East,
            1,
            500,
            Some(Precision),
            "Heat shimmer never bothered their aim.",
        ),
        def(
            "east_river_raiders",
            "River Raiders",
            East,
            2,
            780,
            Some(FirstStrike),
            "They strike from the reeds before dawn.",
        ),
        def(
            "east_wall_breakers",
            "Wall Breakers",
            East,
            2,
            820,
            Some(Siege),
            "Mortar dust is their favorite perfume.",
        ),
        def(
            "east_silk_guard",
            "Silk Guard",
            East,
            3,
            1080,
            Some(Reinforcement),
            "Patient as looms, and as relentless.",
        ),
        def(
            "east_ember_monks",
            "Ember Monks",
            East,
            3,
            1120,
            Some(LastStand),
            "A fire that refuses to be stamped out.",
        ),
        def(
            "east_storm_riders",
            "Storm Riders",
            East,
            3,
            1060,
            None,
            "Thunder on four hundred hooves.",
        ),
        def(
            "east_obsidian_phalanx",
            "Obsidian Phalanx",
            East,
            4,
            1520,
            Some(Endurance),
            "Pressure only polishes them.",
        ),
        def(
            "east_sapper_corps",
            "Sapper Corps",
            East,
            4,
            1480,
            Some(Siege),
            "Cities fall from below.",
        ),
        def(
            "east_night_blades",
            "Night Blades",
            East,
            4,
            1580,
            Some(PartingBlow),
            "Their last breath is a knife.",
        ),
        def(
            "east_khan_tolgar",
            "Khan Tolgar",
            East,
            5,
            2300,
            Some(FirstStrike),
            "He signs treaties with other people's seals.",
        ),
        def(
            "east_jade_empress_guard",
            "Jade Empress Guard",
            East,
            5,
            2350,
            Some(Reinforcement),
            "They arrive precisely when the Empress expects them to.",
        ),
    ]
}

/// Cosmetic location names used when a battle is created without one.
pub fn location_for(map: super::MapType, roll: usize) -> String {
    const PLAINS: [&str; 3] = ["Goldsea Steppe", "Hollow Meadows", "The Long Grass"];
    const FOREST: [&str; 3] = ["Bramblewood", "The Whispering Pines", "Old Thorn Forest"];
    const MOUNTAINS: [&str; 3] = ["Graypeak Pass", "The Shattered Spine", "Eagle's Rest"];
    const DESERT: [&str; 3] = ["The Glass Flats", "Sunforge Dunes", "Mirage Hollow"];
    const CITY: [&str; 3] = ["Port Amber", "Kingsreach", "The Bazaar Quarter"];
    const FORTRESS: [&str; 3] = ["Fort Greywatch", "The Iron Bastion", "Starfall Keep"];

    let names = match map {
        super::MapType::Plains => PLAINS,
        super::MapType::Forest => FOREST,
        super::MapType::Mountains => MOUNTAINS,
        super::MapType::Desert => DESERT,
        super::MapType::City => CITY,
        super::MapType::Fortress => FORTRESS,
    };
    names[roll % names.len()].to_string()
}
