//! PX4 flight mode names and their custom_mode encoding
//! (main mode in bits 16..24, sub mode in bits 24..32).

const PX4_MODES: &[(&str, u8, u8)] = &[
    ("MANUAL", 1, 0),
    ("ALTCTL", 2, 0),
    ("POSCTL", 3, 0),
    ("AUTO.READY", 4, 1),
    ("AUTO.TAKEOFF", 4, 2),
    ("AUTO.LOITER", 4, 3),
    ("AUTO.MISSION", 4, 4),
    ("AUTO.RTL", 4, 5),
    ("AUTO.LAND", 4, 6),
    ("AUTO.FOLLOW_TARGET", 4, 8),
    ("AUTO.PRECLAND", 4, 9),
    ("ACRO", 5, 0),
    ("OFFBOARD", 6, 0),
    ("STABILIZED", 7, 0),
];

/// (main, sub) for a mode name, case-insensitive.
pub fn px4_mode(name: &str) -> Option<(u8, u8)> {
    PX4_MODES
        .iter()
        .find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, main, sub)| (main, sub))
}

/// Name for a HEARTBEAT custom_mode, if it is one we know.
pub fn px4_mode_name(custom_mode: u32) -> Option<&'static str> {
    let main = ((custom_mode >> 16) & 0xFF) as u8;
    let sub = ((custom_mode >> 24) & 0xFF) as u8;
    PX4_MODES
        .iter()
        .find(|&&(_, m, s)| m == main && (s == sub || (s == 0 && main != 4)))
        .map(|&(n, _, _)| n)
}
