//! Telescope global state line (GLST).
//!
//! The telescope answers `GLST` with ten space-separated integers:
//!
//! | position | meaning            | table               |
//! |----------|--------------------|---------------------|
//! | 0        | oil pumps          | [`OilState`]        |
//! | 1        | telescope          | [`TelescopeMode`]   |
//! | 2        | hour axis          | [`AxisState`]       |
//! | 3        | declination axis   | [`DecAxisState`]    |
//! | 4        | focus              | [`FocusState`]      |
//! | 5        | dome               | [`DomeState`]       |
//! | 6        | dome slit          | [`CoverState`]      |
//! | 7        | tube cover         | [`CoverState`]      |
//! | 8        | mirror cover       | [`CoverState`]      |
//! | 9        | packed status bits | [`TelescopeFlags`]  |
//!
//! # Wire compatibility shim
//!
//! Every table reserves index 0 for "unknown", while the wire value 0 means the first
//! defined state. A raw value `v` therefore selects table index `v + 1`; a value that
//! lands past the end of the table (`v >= N - 1`) selects index 0. The server cannot be
//! changed, so this offset is reproduced exactly by [`lookup_sub_state`].

/// One sub-state table: a fixed ordered list of `(machine code, human text)` states.
pub trait SubState: Copy + Sized + 'static {
    /// All states in wire order; index 0 is the "unknown" state.
    const TABLE: &'static [Self];

    /// Machine code, e.g. `TRACK`.
    fn code(self) -> &'static str;

    /// Human readable description, e.g. `tracking`.
    fn text(self) -> &'static str;

    /// The reserved "unknown" state.
    fn unknown() -> Self {
        Self::TABLE[0]
    }

    /// Resolve one raw GLST field through this table.
    fn from_raw(raw: &str) -> Self {
        Self::TABLE
            .get(lookup_sub_state(raw, Self::TABLE.len()))
            .copied()
            .unwrap_or_else(Self::unknown)
    }
}

/// Map a raw GLST field to a table index for a table of `table_len` entries.
///
/// `v` selects `v + 1`; results `>= table_len` fall back to 0 ("unknown"), as do
/// negative and unparsable values.
pub fn lookup_sub_state(raw: &str, table_len: usize) -> usize {
    let Ok(value) = raw.trim().parse::<i64>() else {
        return 0;
    };
    if value < 0 {
        return 0;
    }
    match usize::try_from(value + 1) {
        Ok(index) if index < table_len => index,
        _ => 0,
    }
}

macro_rules! sub_state_table {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident => ($code:literal, $text:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl SubState for $name {
            const TABLE: &'static [Self] = &[$($name::$variant),+];

            fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            fn text(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.text())
            }
        }
    };
}

sub_state_table! {
    /// Oil pump state.
    OilState {
        Unknown => ("UNKNOWN", "unknown"),
        Off => ("OFF", "off"),
        Start1 => ("START1", "checking presure nitrogen"),
        Start2 => ("START2", "starting pumps"),
        Start3 => ("START3", "stabilization presure"),
        On => ("ON", "on"),
        OffDelay => ("OFF_DELAY", "delay before oil off"),
    }
}

sub_state_table! {
    /// Overall telescope mode.
    TelescopeMode {
        Unknown => ("UNKNOWN", "unknown"),
        Init => ("INIT", "initialization sensors"),
        Off => ("OFF", "off"),
        OffWait => ("OFF_WAIT", "waiting on start converters"),
        Stop => ("STOP", "stop telescope"),
        Track => ("TRACK", "tracking"),
        OffReq => ("OFF_REQ", "delay before off"),
        SsClu1 => ("SS_CLU1", "connector"),
        SsSlew => ("SS_SLEW", "aproach on source coordinate"),
        SsDecc2 => ("SS_DECC2", "connector"),
        SsClu2 => ("SS_CLU2", "connector"),
        SsDecc3 => ("SS_DECC3", "braking after halt aproach"),
        SsClu3 => ("SS_CLU3", "connector after halt aproach"),
        StDecc1 => ("ST_DECC1", "braking before aproach on star coordinate"),
        StClu1 => ("ST_CLU1", "connector"),
        StSlew => ("ST_SLEW", "aproach on star coordinate"),
        StDecc2 => ("ST_DECC2", "braking"),
        StClu2 => ("ST_CLU2", "connector"),
        StDecc3 => ("ST_DECC3", "braking after halt aproach"),
        StClu3 => ("ST_CLU3", "connector after halt aproach"),
    }
}

sub_state_table! {
    /// Hour axis drive state.
    AxisState {
        Unknown => ("UNKNOWN", "unknown"),
        Stop => ("STOP", "stop"),
        Position => ("POSITION", "position"),
        CaClu1 => ("CA_CLU1", "connector before calibration"),
        CaFast => ("CA_FAST", "calibration roughly"),
        CaFastBr => ("CA_FASTBR", "calibration roughly braking"),
        CaClu2 => ("CA_CLU2", "connector finely calibration"),
        CaSlow => ("CA_SLOW", "calibration finely"),
        MoBr => ("MO_BR", "shift T1 braking"),
        MoClu1 => ("MO_CLU1", "shift T1 connector"),
        MoFast => ("MO_FAST", "shift T1"),
        MoFastBr => ("MO_FASTBR", "shift T1 braking"),
        MoClu2 => ("MO_CLU2", "shift T1 connector"),
        MoSlow => ("MO_SLOW", "shift T2"),
        MoSlowest => ("MO_SLOWEST", "shift T3"),
    }
}

sub_state_table! {
    /// Declination axis drive state; the hour axis states plus centering.
    DecAxisState {
        Unknown => ("UNKNOWN", "unknown"),
        Stop => ("STOP", "stop"),
        Position => ("POSITION", "position"),
        CaClu1 => ("CA_CLU1", "connector before calibration"),
        CaFast => ("CA_FAST", "calibration roughly"),
        CaFastBr => ("CA_FASTBR", "calibration roughly braking"),
        CaClu2 => ("CA_CLU2", "connector finely calibration"),
        CaSlow => ("CA_SLOW", "calibration finely"),
        MoBr => ("MO_BR", "shift T1 braking"),
        MoClu1 => ("MO_CLU1", "shift T1 connector"),
        MoFast => ("MO_FAST", "shift T1"),
        MoFastBr => ("MO_FASTBR", "shift T1 braking"),
        MoClu2 => ("MO_CLU2", "shift T1 connector"),
        MoSlow => ("MO_SLOW", "shift T2"),
        MoSlowest => ("MO_SLOWEST", "shift T3"),
        CenmSlowBr => ("CENM_SLOWBR", "manual centering, braking"),
        CenmClu3 => ("CENM_CLU3", "manual centering, connector"),
        CenmCen => ("CENM_CEN", "manual centering, centering"),
        CenmBr => ("CENM_BR", "manual centering, braking"),
        CenmClu4 => ("CENM_CLU4", "manual centering, connector"),
        CenaSlowBr => ("CENA_SLOWBR", "automatic centering, braking"),
        CenaClu3 => ("CENA_CLU3", "automatic centering, connector"),
        CenaCen => ("CENA_CEN", "automatic centering, centering"),
        CenaBr => ("CENA_BR", "automatic centering, braking"),
        CenaClu4 => ("CENA_CLU4", "automatic centering, connector"),
    }
}

sub_state_table! {
    /// Focus drive state.
    FocusState {
        Unknown => ("UNKNOWN", "unknown"),
        Off => ("OFF", "off"),
        Stop => ("STOP", "stop"),
        Plus => ("PLUS", "manual shift +"),
        Minus => ("MINUS", "manual shift -"),
        Slew => ("SLEW", "aproach on position"),
        Cal1 => ("CAL1", "roughly calibration"),
        Cal2 => ("CAL2", "finely calibration"),
    }
}

sub_state_table! {
    /// Dome rotation state.
    DomeState {
        Unknown => ("UNKNOWN", "unknown"),
        Off => ("OFF", "off"),
        Stop => ("STOP", "stop"),
        Plus => ("PLUS", "manual shift +"),
        Minus => ("MINUS", "manual shift -"),
        SlewPlus => ("SLEW_PLUS", "aproach on position +"),
        SlewMinus => ("SLEW_MINUS", "aproach on position -"),
        AutoStop => ("AUTO_STOP", "automatic positioning, stop"),
        AutoPlus => ("AUTO_PLUS", "automatic positioning, aproach on position +"),
        AutoMinus => ("AUTO_MINUS", "automatic positioning, aproach on position -"),
        Calibration => ("CALIBRATION", "calibration"),
    }
}

sub_state_table! {
    /// Dome slit, tube cover and mirror cover state.
    CoverState {
        Unknown => ("UNKNOWN", "unknown"),
        Undef => ("UNDEF", "undefine"),
        Opening => ("OPENING", "opening"),
        Closing => ("CLOSING", "closing"),
        Open => ("OPEN", "open"),
        Close => ("CLOSE", "close"),
    }
}

/// The nine independent flags packed into GLST position 9.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelescopeFlags {
    /// Bit 0.
    pub ha_calibrated: bool,
    /// Bit 1.
    pub dec_calibrated: bool,
    /// Bit 2.
    pub dome_calibrated: bool,
    /// Bit 3.
    pub focus_calibrated: bool,
    /// Bit 4.
    pub aberration: bool,
    /// Bit 5.
    pub precession: bool,
    /// Bit 6.
    pub refraction: bool,
    /// Bit 7.
    pub model: bool,
    /// Bit 8.
    pub guide_mode: bool,
}

impl TelescopeFlags {
    /// Unpack bits 0..=8; higher bits are ignored.
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        let bit = |k: u32| (bits >> k) & 1 == 1;
        Self {
            ha_calibrated: bit(0),
            dec_calibrated: bit(1),
            dome_calibrated: bit(2),
            focus_calibrated: bit(3),
            aberration: bit(4),
            precession: bit(5),
            refraction: bit(6),
            model: bit(7),
            guide_mode: bit(8),
        }
    }
}

/// Decoded telescope GLST line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelescopeGlst {
    pub oil: OilState,
    pub telescope: TelescopeMode,
    pub ha: AxisState,
    pub dec: DecAxisState,
    pub focus: FocusState,
    pub dome: DomeState,
    pub slit: CoverState,
    pub tube: CoverState,
    pub mirror: CoverState,
    /// `None` when the packed field is missing or not a number.
    pub flags: Option<TelescopeFlags>,
}

/// Number of fields in a complete telescope GLST line.
pub const TELESCOPE_GLST_FIELDS: usize = 10;

impl Default for TelescopeGlst {
    fn default() -> Self {
        Self {
            oil: OilState::unknown(),
            telescope: TelescopeMode::unknown(),
            ha: AxisState::unknown(),
            dec: DecAxisState::unknown(),
            focus: FocusState::unknown(),
            dome: DomeState::unknown(),
            slit: CoverState::unknown(),
            tube: CoverState::unknown(),
            mirror: CoverState::unknown(),
            flags: None,
        }
    }
}

impl TelescopeGlst {
    /// Decode a GLST line. A line with fewer than ten fields decodes to all-unknown.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < TELESCOPE_GLST_FIELDS {
            return Self::default();
        }

        Self {
            oil: OilState::from_raw(fields[0]),
            telescope: TelescopeMode::from_raw(fields[1]),
            ha: AxisState::from_raw(fields[2]),
            dec: DecAxisState::from_raw(fields[3]),
            focus: FocusState::from_raw(fields[4]),
            dome: DomeState::from_raw(fields[5]),
            slit: CoverState::from_raw(fields[6]),
            tube: CoverState::from_raw(fields[7]),
            mirror: CoverState::from_raw(fields[8]),
            flags: fields[9].parse::<u32>().ok().map(TelescopeFlags::from_bits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_zero_is_first_defined_state() {
        assert_eq!(lookup_sub_state("0", 7), 1);
        assert_eq!(OilState::from_raw("0"), OilState::Off);
        assert_eq!(TelescopeMode::from_raw("4"), TelescopeMode::Track);
    }

    #[test]
    fn last_raw_value_wraps_to_unknown() {
        // v = N - 1 selects index 0
        assert_eq!(lookup_sub_state("6", 7), 0);
        assert_eq!(OilState::from_raw("6"), OilState::Unknown);
        assert_eq!(CoverState::from_raw("5"), CoverState::Unknown);
        assert_eq!(CoverState::from_raw("4"), CoverState::Close);
    }

    #[test]
    fn out_of_range_and_garbage_are_unknown() {
        assert_eq!(lookup_sub_state("99", 7), 0);
        assert_eq!(lookup_sub_state("-1", 7), 0);
        assert_eq!(lookup_sub_state("-7", 7), 0);
        assert_eq!(lookup_sub_state("x", 7), 0);
        assert_eq!(lookup_sub_state("", 7), 0);
    }

    #[test]
    fn table_sizes_match_wire_protocol() {
        assert_eq!(OilState::TABLE.len(), 7);
        assert_eq!(TelescopeMode::TABLE.len(), 20);
        assert_eq!(AxisState::TABLE.len(), 15);
        assert_eq!(DecAxisState::TABLE.len(), 25);
        assert_eq!(FocusState::TABLE.len(), 8);
        assert_eq!(DomeState::TABLE.len(), 11);
        assert_eq!(CoverState::TABLE.len(), 6);
    }

    #[test]
    fn codes_and_texts() {
        assert_eq!(DecAxisState::CenaCen.code(), "CENA_CEN");
        assert_eq!(DecAxisState::CenaCen.text(), "automatic centering, centering");
        assert_eq!(DomeState::AutoStop.to_string(), "automatic positioning, stop");
    }

    #[test]
    fn flags_unpack_in_documented_order() {
        let flags = TelescopeFlags::from_bits(0b1_0101_0011);
        assert!(flags.ha_calibrated);
        assert!(flags.dec_calibrated);
        assert!(!flags.dome_calibrated);
        assert!(!flags.focus_calibrated);
        assert!(flags.aberration);
        assert!(!flags.precession);
        assert!(flags.refraction);
        assert!(!flags.model);
        assert!(flags.guide_mode);

        assert_eq!(TelescopeFlags::from_bits(0), TelescopeFlags::default());
    }

    #[test]
    fn parses_full_line() {
        let glst = TelescopeGlst::parse("4 4 1 1 1 0 3 3 3 240");
        assert_eq!(glst.oil, OilState::On);
        assert_eq!(glst.telescope, TelescopeMode::Track);
        assert_eq!(glst.ha, AxisState::Position);
        assert_eq!(glst.dec, DecAxisState::Position);
        assert_eq!(glst.focus, FocusState::Stop);
        assert_eq!(glst.dome, DomeState::Off);
        assert_eq!(glst.slit, CoverState::Open);
        let flags = glst.flags.unwrap();
        assert!(flags.aberration && flags.precession && flags.refraction && flags.model);
        assert!(!flags.ha_calibrated && !flags.guide_mode);
    }

    #[test]
    fn short_line_is_all_unknown() {
        let glst = TelescopeGlst::parse("4 4 1");
        assert_eq!(glst, TelescopeGlst::default());
        assert_eq!(glst.oil, OilState::Unknown);
        assert!(glst.flags.is_none());
    }
}
