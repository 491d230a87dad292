use serde_repr::{Deserialize_repr, Serialize_repr};

/// The four gamemodes, in the order the `mode` columns use.
#[derive(Deserialize_repr, Serialize_repr, clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Gamemode {
    #[default]
    Standard = 0,
    Taiko = 1,
    CatchTheBeat = 2,
    Mania = 3
}

impl Gamemode {
    /// Table-name suffix of the per-mode score and stats tables.
    pub fn suffix(self) -> &'static str {
        match self {
            Gamemode::Standard => "",
            Gamemode::Taiko => "_taiko",
            Gamemode::CatchTheBeat => "_fruits",
            Gamemode::Mania => "_mania"
        }
    }

    /// Tag attached to every metric as the `mode` label.
    pub fn tag(self) -> &'static str {
        match self {
            Gamemode::Standard => "osu",
            Gamemode::Taiko => "taiko",
            Gamemode::CatchTheBeat => "catch_the_beat",
            Gamemode::Mania => "osu_mania"
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Gamemode::Standard => "osu!",
            Gamemode::Taiko => "Taiko",
            Gamemode::CatchTheBeat => "Catch the Beat",
            Gamemode::Mania => "osu!mania"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Gamemode;

    #[test]
    fn test_table_suffixes() {
        assert_eq!(Gamemode::Standard.suffix(), "");
        assert_eq!(Gamemode::Taiko.suffix(), "_taiko");
        assert_eq!(Gamemode::CatchTheBeat.suffix(), "_fruits");
        assert_eq!(Gamemode::Mania.suffix(), "_mania");
    }

    #[test]
    fn test_metric_tags() {
        assert_eq!(Gamemode::Standard.tag(), "osu");
        assert_eq!(Gamemode::Taiko.tag(), "taiko");
        assert_eq!(Gamemode::CatchTheBeat.tag(), "catch_the_beat");
        assert_eq!(Gamemode::Mania.tag(), "osu_mania");
    }
}
