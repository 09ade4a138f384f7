/// Column-name constants for the sightings dataset.
/// Single source of truth - shared by the loader, the filters and the exports.

// ── Sighting columns ────────────────────────────────────────────────────────
pub mod sighting {
    pub const DATE: &str = "Fecha";
    pub const LOCATION: &str = "Lugar";
    pub const INDIVIDUAL: &str = "Orca";
    pub const PARTICIPANTS: &str = "Orcas";
    pub const GROUP: &str = "Grupo";
    pub const SEX: &str = "Sexo";
    pub const STRANDS: &str = "Varadora";
    pub const LATITUDE: &str = "Latitud";
    pub const LONGITUDE: &str = "Longitud";
    pub const LINK: &str = "Link";

    pub const REQUIRED: [&str; 10] = [
        DATE,
        LOCATION,
        INDIVIDUAL,
        PARTICIPANTS,
        GROUP,
        SEX,
        STRANDS,
        LATITUDE,
        LONGITUDE,
        LINK,
    ];
}

// ── Catalog export columns ──────────────────────────────────────────────────
pub mod catalog {
    use super::sighting;

    pub const INDIVIDUAL: &str = sighting::INDIVIDUAL;
    pub const SEX: &str = sighting::SEX;
    pub const GROUP: &str = sighting::GROUP;
    pub const STRANDS: &str = sighting::STRANDS;

    pub const ALL: [&str; 4] = [INDIVIDUAL, SEX, GROUP, STRANDS];

    pub const FILE_NAME: &str = "orcas_filtradas.csv";
}

// ── Count table columns ─────────────────────────────────────────────────────
pub mod counts {
    pub const VALUE: &str = "value";
    pub const COUNT: &str = "count";
}

// ── Sentinel values ─────────────────────────────────────────────────────────
pub mod sentinel {
    pub const FEMALE: &str = "♀";
    pub const MALE: &str = "♂";
    pub const STRANDS_YES: &str = "Sí";
}

// ── Relation graph frames ───────────────────────────────────────────────────
pub mod graph {
    pub const NODE: &str = "node";
    pub const GROUP: &str = "group";
    pub const COLOR: &str = "color";
    pub const SIZE: &str = "size";
    pub const X: &str = "x";
    pub const Y: &str = "y";

    pub const SOURCE: &str = "source";
    pub const TARGET: &str = "target";
    pub const WEIGHT: &str = "weight";
    pub const WIDTH: &str = "width";
    pub const OPACITY: &str = "opacity";

    pub const UNKNOWN_GROUP: &str = "unknown";
}
