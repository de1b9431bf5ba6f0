/// Label mappings for the categorical accident attributes.
///
/// The accident records published by the city encode accident and road types
/// as short codes (`at2`, `rt433`, ...). The classifier was trained on the
/// English descriptions of the accident types, so those descriptions are what
/// ends up in the `AccidentType` feature column.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Accident types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccidentType {
    SkiddingOrSelfAccident,
    OvertakingOrChangingLanes,
    RearEndCollision,
    TurningLeftOrRight,
    TurningIntoMainRoad,
    CrossingTheLanes,
    HeadOnCollision,
    Parking,
    InvolvingPedestrians,
    InvolvingAnimals,
    Other,
}

impl AccidentType {
    pub const ALL: [AccidentType; 11] = [
        AccidentType::SkiddingOrSelfAccident,
        AccidentType::OvertakingOrChangingLanes,
        AccidentType::RearEndCollision,
        AccidentType::TurningLeftOrRight,
        AccidentType::TurningIntoMainRoad,
        AccidentType::CrossingTheLanes,
        AccidentType::HeadOnCollision,
        AccidentType::Parking,
        AccidentType::InvolvingPedestrians,
        AccidentType::InvolvingAnimals,
        AccidentType::Other,
    ];

    /// Code used in the city's accident records.
    pub fn code(&self) -> &'static str {
        match self {
            AccidentType::SkiddingOrSelfAccident => "at0",
            AccidentType::OvertakingOrChangingLanes => "at1",
            AccidentType::RearEndCollision => "at2",
            AccidentType::TurningLeftOrRight => "at3",
            AccidentType::TurningIntoMainRoad => "at4",
            AccidentType::CrossingTheLanes => "at5",
            AccidentType::HeadOnCollision => "at6",
            AccidentType::Parking => "at7",
            AccidentType::InvolvingPedestrians => "at8",
            AccidentType::InvolvingAnimals => "at9",
            AccidentType::Other => "at00",
        }
    }

    /// Description, which is also the category value the model was fitted on.
    pub fn description(&self) -> &'static str {
        match self {
            AccidentType::SkiddingOrSelfAccident => "Accident with skidding or self-accident",
            AccidentType::OvertakingOrChangingLanes => "Accident when overtaking or changing lanes",
            AccidentType::RearEndCollision => "Accident with rear-end collision",
            AccidentType::TurningLeftOrRight => "Accident when turning left or right",
            AccidentType::TurningIntoMainRoad => "Accident when turning into main road",
            AccidentType::CrossingTheLanes => "Accident when crossing the lane(s)",
            AccidentType::HeadOnCollision => "Accident with head-on collision",
            AccidentType::Parking => "Accident when parking",
            AccidentType::InvolvingPedestrians => "Accident involving pedestrian(s)",
            AccidentType::InvolvingAnimals => "Accident involving animal(s)",
            AccidentType::Other => "Other",
        }
    }

    /// Accepts either the record code (`at2`) or the full description,
    /// case-insensitively.
    pub fn parse(value: &str) -> Option<AccidentType> {
        let value = value.trim();
        Self::ALL.iter().copied().find(|t| {
            t.code().eq_ignore_ascii_case(value) || t.description().eq_ignore_ascii_case(value)
        })
    }
}

impl fmt::Display for AccidentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

// ---------------------------------------------------------------------------
// Road types
// ---------------------------------------------------------------------------

/// Human-readable description for a road type code. Unmapped codes are
/// reported as "Unknown" rather than rejected; the station table is the
/// source of truth for which codes exist.
pub fn road_type_description(code: &str) -> &'static str {
    match code {
        "rt432" => "Principal road",
        "rt433" => "Minor road",
        "rt439" => "Other",
        _ => "Unknown",
    }
}

// ---------------------------------------------------------------------------
// Weekdays
// ---------------------------------------------------------------------------

/// ISO weekday number (Monday = 1 .. Sunday = 7) to its English name.
pub fn weekday_name(weekday: u32) -> &'static str {
    match weekday {
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        7 => "Sunday",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accident_type_parse_accepts_code_and_description() {
        assert_eq!(AccidentType::parse("at2"), Some(AccidentType::RearEndCollision));
        assert_eq!(
            AccidentType::parse("accident with rear-end collision"),
            Some(AccidentType::RearEndCollision)
        );
        assert_eq!(AccidentType::parse("AT00"), Some(AccidentType::Other));
        assert_eq!(AccidentType::parse("at42"), None);
    }

    #[test]
    fn test_accident_type_codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for t in AccidentType::ALL {
            assert!(seen.insert(t.code()), "duplicate code {}", t.code());
        }
    }

    #[test]
    fn test_road_type_description_falls_back_to_unknown() {
        assert_eq!(road_type_description("rt433"), "Minor road");
        assert_eq!(road_type_description("rt999"), "Unknown");
    }

    #[test]
    fn test_weekday_name_uses_iso_numbering() {
        assert_eq!(weekday_name(1), "Monday");
        assert_eq!(weekday_name(7), "Sunday");
        assert_eq!(weekday_name(0), "Unknown");
    }
}
