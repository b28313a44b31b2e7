//! Static class pools for each detection category.

use crate::identity::NamePool;

#[derive(Debug)]
pub struct SpeciesProfile {
    /// Species key used for identity buckets and ids ("whitetail-004").
    pub key: &'static str,
    pub class: &'static str,
    pub subclass: Option<&'static str>,
    /// kingdom, phylum, class, order, family, genus, species
    pub taxonomy: [&'static str; 7],
    pub sexes: &'static [&'static str],
    /// Whether sex is sometimes not determinable from the frame.
    pub sex_often_unknown: bool,
    pub ages: &'static [&'static str],
    pub actions: &'static [&'static str],
    pub colors: &'static [&'static str],
    pub sizes: &'static [&'static str],
    pub name_pools: &'static [NamePool],
    /// Sex that carries antlers, for deer.
    pub antlered_sex: Option<&'static str>,
    pub antlered_ages: &'static [&'static str],
    pub herd_animal: bool,
    pub trackable: bool,
    pub abundance: f64,
}

impl SpeciesProfile {
    pub fn carries_antlers(&self, sex: Option<&str>, age: &str) -> bool {
        self.class == "deer"
            && self.antlered_sex.is_some()
            && sex == self.antlered_sex
            && self.antlered_ages.contains(&age)
    }
}

const DEER_AGES: &[&str] = &["fawn", "yearling", "mature", "adult"];
const DEER_ACTIONS: &[&str] = &["feeding", "walking", "running", "standing", "bedding"];

pub const SPECIES: &[SpeciesProfile] = &[
    SpeciesProfile {
        key: "whitetail",
        class: "deer",
        subclass: Some("whitetail"),
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "cervidae", "odocoileus", "virginianus"],
        sexes: &["buck", "doe"],
        sex_often_unknown: false,
        ages: DEER_AGES,
        actions: DEER_ACTIONS,
        colors: &["brown", "tan", "gray-brown"],
        sizes: &["medium", "large"],
        name_pools: &[
            NamePool { sex: "buck", names: &["Big Eight", "Wide Spread", "Tall Tines", "Drop Tine"] },
            NamePool { sex: "doe", names: &["Big Mama", "Lead Doe", "Notch Ear", "Limpy"] },
        ],
        antlered_sex: Some("buck"),
        antlered_ages: &["mature", "adult"],
        herd_animal: true,
        trackable: true,
        abundance: 30.0,
    },
    SpeciesProfile {
        key: "axis",
        class: "deer",
        subclass: Some("axis"),
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "cervidae", "axis", "axis"],
        sexes: &["buck", "doe"],
        sex_often_unknown: false,
        ages: DEER_AGES,
        actions: DEER_ACTIONS,
        colors: &["reddish-brown", "chestnut", "spotted-white"],
        sizes: &["medium", "large"],
        name_pools: &[
            NamePool { sex: "buck", names: &["Spots", "Long Beam", "Triple Point", "Chocolate"] },
            NamePool { sex: "doe", names: &["Speckles", "Beauty", "Alert One", "Watchful"] },
        ],
        antlered_sex: Some("buck"),
        antlered_ages: &["mature", "adult"],
        herd_animal: true,
        trackable: true,
        abundance: 10.0,
    },
    SpeciesProfile {
        key: "red_stag",
        class: "deer",
        subclass: Some("red_stag"),
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "cervidae", "cervus", "elaphus"],
        sexes: &["stag", "hind"],
        sex_often_unknown: false,
        ages: &["calf", "yearling", "mature", "royal", "imperial"],
        actions: &["feeding", "walking", "running", "standing", "bugling"],
        colors: &["reddish-brown", "dark-brown", "tan"],
        sizes: &["large", "very-large"],
        name_pools: &[
            NamePool { sex: "stag", names: &["Royal", "Emperor", "Crown King", "Massive"] },
            NamePool { sex: "hind", names: &["Matriarch", "Lead Hind", "Swift One"] },
        ],
        antlered_sex: Some("stag"),
        antlered_ages: &["mature", "royal", "imperial"],
        herd_animal: true,
        trackable: true,
        abundance: 3.0,
    },
    SpeciesProfile {
        key: "fallow",
        class: "deer",
        subclass: Some("fallow"),
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "cervidae", "dama", "dama"],
        sexes: &["buck", "doe"],
        sex_often_unknown: false,
        ages: DEER_AGES,
        actions: DEER_ACTIONS,
        colors: &["spotted", "white", "dark-brown", "chestnut"],
        sizes: &["medium", "large"],
        name_pools: &[
            NamePool { sex: "buck", names: &["Palms", "Wide One", "White Knight", "Dark Prince"] },
            NamePool { sex: "doe", names: &["Dappled", "Light Foot", "Watcher"] },
        ],
        antlered_sex: Some("buck"),
        antlered_ages: &["mature", "adult"],
        herd_animal: true,
        trackable: true,
        abundance: 5.0,
    },
    SpeciesProfile {
        key: "blackbuck",
        class: "blackbuck",
        subclass: None,
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "bovidae", "antilope", "cervicapra"],
        sexes: &["male", "female"],
        sex_often_unknown: false,
        ages: &["juvenile", "adult"],
        actions: &["feeding", "walking", "running", "standing", "leaping"],
        colors: &["black-and-white", "tan", "brown"],
        sizes: &["medium"],
        name_pools: &[
            NamePool { sex: "male", names: &["Twisted Horn", "Black Prince", "Leaper", "Spiral"] },
            NamePool { sex: "female", names: &["Tan Beauty", "Swift", "Alert One"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: true,
        trackable: true,
        abundance: 4.0,
    },
    SpeciesProfile {
        key: "addax",
        class: "addax",
        subclass: None,
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "bovidae", "addax", "nasomaculatus"],
        sexes: &["male", "female"],
        sex_often_unknown: false,
        ages: &["juvenile", "adult"],
        actions: &["feeding", "walking", "standing", "resting"],
        colors: &["white", "sandy", "light-tan"],
        sizes: &["medium", "large"],
        name_pools: &[
            NamePool { sex: "male", names: &["Desert King", "Spiral", "White Sheikh", "Long Horn"] },
            NamePool { sex: "female", names: &["Sand Dancer", "Pale One", "Dune"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: true,
        trackable: true,
        abundance: 2.0,
    },
    SpeciesProfile {
        key: "aoudad",
        class: "aoudad",
        subclass: None,
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "bovidae", "ammotragus", "lervia"],
        sexes: &["ram", "ewe"],
        sex_often_unknown: false,
        ages: &["lamb", "juvenile", "adult"],
        actions: &["climbing", "feeding", "walking", "standing", "resting"],
        colors: &["tan", "sandy", "reddish-brown"],
        sizes: &["medium", "large"],
        name_pools: &[
            NamePool { sex: "ram", names: &["Mountain King", "Curl", "Rocky", "Old Man"] },
            NamePool { sex: "ewe", names: &["Climber", "Watcher", "Nimble"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: true,
        trackable: true,
        abundance: 4.0,
    },
    SpeciesProfile {
        key: "gemsbok",
        class: "oryx",
        subclass: Some("gemsbok"),
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "bovidae", "oryx", "gazella"],
        sexes: &["male", "female"],
        sex_often_unknown: false,
        ages: &["juvenile", "adult"],
        actions: &["feeding", "walking", "running", "standing", "grazing"],
        colors: &["tan-and-black", "gray-and-black", "brown-and-white"],
        sizes: &["large"],
        name_pools: &[
            NamePool { sex: "male", names: &["Spear", "Long Horn", "Warrior", "Painted Face"] },
            NamePool { sex: "female", names: &["Elegant", "Desert Queen", "Sharp Point"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: true,
        trackable: true,
        abundance: 2.0,
    },
    SpeciesProfile {
        key: "ibex",
        class: "ibex",
        subclass: None,
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "bovidae", "capra", "nubiana"],
        sexes: &["billy", "nanny"],
        sex_often_unknown: false,
        ages: &["kid", "juvenile", "adult"],
        actions: &["climbing", "feeding", "walking", "standing", "jumping"],
        colors: &["brown", "tan", "gray-brown"],
        sizes: &["medium"],
        name_pools: &[
            NamePool { sex: "billy", names: &["Ridge Walker", "Curved Horn", "Summit", "Old Climber"] },
            NamePool { sex: "nanny", names: &["Rock Dancer", "Hill Watcher", "Agile One"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: true,
        trackable: true,
        abundance: 2.0,
    },
    SpeciesProfile {
        key: "nilgai",
        class: "nilgai",
        subclass: None,
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "bovidae", "boselaphus", "tragocamelus"],
        sexes: &["bull", "cow"],
        sex_often_unknown: false,
        ages: &["calf", "juvenile", "adult"],
        actions: &["feeding", "walking", "running", "standing", "grazing"],
        colors: &["bluish-gray", "brown", "grayish-brown"],
        sizes: &["large", "very-large"],
        name_pools: &[
            NamePool { sex: "bull", names: &["Blue Bull", "White Throat", "Giant", "Massive"] },
            NamePool { sex: "cow", names: &["Brown Beauty", "Swift Runner", "Watchful"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: true,
        trackable: true,
        abundance: 4.0,
    },
    SpeciesProfile {
        key: "sika",
        class: "sika",
        subclass: None,
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "cervidae", "cervus", "nippon"],
        sexes: &["stag", "hind"],
        sex_often_unknown: false,
        ages: &["calf", "yearling", "adult"],
        actions: &["feeding", "walking", "running", "standing", "calling"],
        colors: &["chestnut", "spotted", "dark-brown"],
        sizes: &["medium"],
        name_pools: &[
            NamePool { sex: "stag", names: &["Dappled King", "Whistler", "Forest Ghost", "Bamboo"] },
            NamePool { sex: "hind", names: &["Spots", "Quiet Walker", "Silk"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: true,
        trackable: true,
        abundance: 3.0,
    },
    SpeciesProfile {
        key: "coyote",
        class: "coyote",
        subclass: None,
        taxonomy: ["animalia", "chordata", "mammalia", "carnivora", "canidae", "canis", "latrans"],
        sexes: &["male", "female"],
        sex_often_unknown: true,
        ages: &["juvenile", "adult"],
        actions: &["walking", "running", "hunting", "carrying prey"],
        colors: &["gray", "tan", "reddish-brown"],
        sizes: &["medium"],
        name_pools: &[
            NamePool { sex: "male", names: &["Alpha", "Scout", "Trickster"] },
            NamePool { sex: "female", names: &["Alpha Female", "Hunter"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: false,
        trackable: true,
        abundance: 8.0,
    },
    SpeciesProfile {
        key: "wild_boar",
        class: "boar",
        subclass: Some("wild"),
        taxonomy: ["animalia", "chordata", "mammalia", "artiodactyla", "suidae", "sus", "scrofa"],
        sexes: &["boar", "sow"],
        sex_often_unknown: true,
        ages: &["piglet", "juvenile", "adult"],
        actions: &["foraging", "rooting", "walking", "wallowing"],
        colors: &["black", "brown", "dark-gray"],
        sizes: &["medium", "large"],
        name_pools: &[
            NamePool { sex: "boar", names: &["Big Tusker", "Razorback", "Old Scar"] },
            NamePool { sex: "sow", names: &["Matriarch", "Lead Sow"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: true,
        trackable: true,
        abundance: 10.0,
    },
    SpeciesProfile {
        key: "wild_turkey",
        class: "turkey",
        subclass: Some("wild"),
        taxonomy: ["animalia", "chordata", "aves", "galliformes", "phasianidae", "meleagris", "gallopavo"],
        sexes: &["tom", "hen", "jake"],
        sex_often_unknown: false,
        ages: &["poult", "juvenile", "adult"],
        actions: &["feeding", "strutting", "walking", "dust bathing"],
        colors: &["brown", "dark", "iridescent"],
        sizes: &["small", "medium"],
        name_pools: &[
            NamePool { sex: "tom", names: &["Long Beard", "Double Spurs", "King Strut"] },
            NamePool { sex: "hen", names: &["Lead Hen", "Nesting Mama"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: true,
        trackable: true,
        abundance: 10.0,
    },
    SpeciesProfile {
        key: "bobcat",
        class: "bobcat",
        subclass: None,
        taxonomy: ["animalia", "chordata", "mammalia", "carnivora", "felidae", "lynx", "rufus"],
        sexes: &["male", "female"],
        sex_often_unknown: true,
        ages: &["juvenile", "adult"],
        actions: &["walking", "stalking", "running", "hunting"],
        colors: &["tan", "spotted", "reddish-brown"],
        sizes: &["small", "medium"],
        name_pools: &[
            NamePool { sex: "male", names: &["Spots", "Ghost", "Shadow"] },
            NamePool { sex: "female", names: &["Huntress", "Prowler"] },
        ],
        antlered_sex: None,
        antlered_ages: &[],
        herd_animal: false,
        trackable: true,
        abundance: 3.0,
    },
];

pub const ANTLER_FEATURES: &[&str] = &["drop tine", "kicker", "sticker", "split G2", "non-typical"];
pub const BODY_CONDITIONS: &[&str] = &["fair", "good", "excellent"];

pub fn species(key: &str) -> Option<&'static SpeciesProfile> {
    SPECIES.iter().find(|s| s.key == key)
}

pub fn is_wildlife_class(class: &str) -> bool {
    SPECIES.iter().any(|s| s.class == class)
}

pub mod person {
    pub const SUBCLASSES: &[&str] = &["hunter", "worker", "hiker", "visitor"];
    pub const GENDERS: &[&str] = &["male", "female"];
    pub const AGE_RANGES: &[&str] = &["child", "teenager", "adult", "elderly"];
    pub const ACTIVITIES: &[&str] = &["walking", "standing", "hunting", "working", "driving", "riding"];
    pub const POSTURES: &[&str] = &["standing", "crouching", "sitting", "walking", "running"];
    pub const HEIGHTS: &[&str] = &["short", "average", "tall"];
    pub const BUILDS: &[&str] = &["small", "medium", "large", "thin", "heavy"];
    pub const UPPER_BODY: &[&str] = &["t-shirt", "jacket", "hoodie", "flannel", "camo", "vest", "coat"];
    pub const LOWER_BODY: &[&str] = &["jeans", "pants", "shorts", "camo pants"];
    pub const HEADWEAR: &[&str] = &["cap", "hat", "helmet", "beanie"];
    pub const COLORS: &[&str] = &["blue", "green", "brown", "black", "red", "orange", "camo", "tan", "gray"];
    pub const ACCESSORIES: &[&str] = &["backpack", "binoculars", "rifle", "fishing gear", "camera", "phone"];
    pub const CARRYING: &[&str] = &["bag", "tool", "weapon", "equipment"];
}

#[derive(Debug)]
pub struct VehicleKind {
    pub kind: &'static str,
    pub wheels: &'static [u8],
    pub doors: &'static [u8],
    pub carries_occupants: bool,
    pub makes: &'static [(&'static str, &'static [&'static str])],
}

const TRUCK_MAKES: &[(&str, &[&str])] = &[
    ("Ford", &["F-150", "Ranger"]),
    ("Chevrolet", &["Silverado", "Colorado"]),
    ("Toyota", &["Tacoma", "Tundra"]),
    ("Dodge", &["Ram 1500", "Ram 2500"]),
    ("Jeep", &["Gladiator"]),
];

const UTILITY_MAKES: &[(&str, &[&str])] = &[
    ("Polaris", &["Ranger", "RZR", "Sportsman"]),
    ("Honda", &["Pioneer", "Foreman", "Rancher", "Talon"]),
    ("Kawasaki", &["Mule", "Teryx", "Brute Force"]),
    ("John Deere", &["Gator"]),
];

pub const VEHICLES: &[VehicleKind] = &[
    VehicleKind {
        kind: "truck",
        wheels: &[4, 6],
        doors: &[2, 4],
        carries_occupants: true,
        makes: TRUCK_MAKES,
    },
    VehicleKind {
        kind: "suv",
        wheels: &[4],
        doors: &[4, 5],
        carries_occupants: true,
        makes: &[
            ("Ford", &["Bronco", "Explorer"]),
            ("Chevrolet", &["Tahoe", "Suburban"]),
            ("Toyota", &["4Runner", "Land Cruiser"]),
            ("Jeep", &["Wrangler", "Cherokee"]),
            ("Dodge", &["Durango"]),
        ],
    },
    VehicleKind {
        kind: "car",
        wheels: &[4],
        doors: &[2, 4],
        carries_occupants: true,
        makes: &[
            ("Ford", &["Mustang", "Fusion"]),
            ("Chevrolet", &["Malibu", "Impala"]),
            ("Toyota", &["Camry", "Corolla"]),
            ("Honda", &["Accord", "Civic"]),
        ],
    },
    VehicleKind {
        kind: "atv",
        wheels: &[4],
        doors: &[0],
        carries_occupants: false,
        makes: &[
            ("Polaris", &["Sportsman"]),
            ("Honda", &["Foreman", "Rancher"]),
            ("Kawasaki", &["Brute Force"]),
        ],
    },
    VehicleKind {
        kind: "utility vehicle",
        wheels: &[4],
        doors: &[0, 2],
        carries_occupants: true,
        makes: UTILITY_MAKES,
    },
    VehicleKind {
        kind: "motorcycle",
        wheels: &[2],
        doors: &[0],
        carries_occupants: false,
        makes: &[
            ("Honda", &["CRF450", "Africa Twin"]),
            ("Kawasaki", &["KLR650"]),
        ],
    },
];

pub mod vehicle {
    pub const PAINT_COLORS: &[&str] = &["black", "white", "silver", "red", "blue", "green", "brown", "orange", "camo"];
    pub const YEAR_RANGES: &[&str] = &["2010-2015", "2015-2020", "2020-2025"];
    pub const DISTINCTIVE_MARKS: &[&str] = &["light bar", "winch", "roof rack", "lift kit", "mud tires"];
    pub const PLATE_STATES: &[&str] = &["TX", "OK", "LA", "NM", "AR"];
    pub const DIRECTIONS: &[&str] = &[
        "north", "south", "east", "west", "northeast", "northwest", "southeast", "southwest",
    ];
    pub const PLATE_LETTERS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
}

#[derive(Debug)]
pub struct OtherClass {
    pub class: &'static str,
    pub subclasses: &'static [&'static str],
    pub behaviors: &'static [&'static str],
    pub is_domestic: bool,
    /// Plausible body length range in centimeters.
    pub length_cm: (u32, u32),
    pub abundance: f64,
}

pub const OTHER: &[OtherClass] = &[
    OtherClass {
        class: "bird",
        subclasses: &["songbird", "raptor", "quail", "roadrunner"],
        behaviors: &["perched", "flying", "foraging"],
        is_domestic: false,
        length_cm: (12, 60),
        abundance: 35.0,
    },
    OtherClass {
        class: "domestic_cat",
        subclasses: &[],
        behaviors: &["walking", "hunting", "sitting"],
        is_domestic: true,
        length_cm: (40, 55),
        abundance: 10.0,
    },
    OtherClass {
        class: "dog",
        subclasses: &["ranch dog", "hunting dog"],
        behaviors: &["walking", "running", "sniffing"],
        is_domestic: true,
        length_cm: (50, 110),
        abundance: 20.0,
    },
    OtherClass {
        class: "cattle",
        subclasses: &["angus", "hereford", "longhorn"],
        behaviors: &["grazing", "walking", "resting"],
        is_domestic: true,
        length_cm: (180, 250),
        abundance: 20.0,
    },
    OtherClass {
        class: "horse",
        subclasses: &[],
        behaviors: &["grazing", "walking", "standing"],
        is_domestic: true,
        length_cm: (200, 240),
        abundance: 8.0,
    },
    OtherClass {
        class: "insect",
        subclasses: &["moth", "wasp"],
        behaviors: &["flying", "crawling"],
        is_domestic: false,
        length_cm: (1, 5),
        abundance: 7.0,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_species_keys_unique() {
        let keys: HashSet<&str> = SPECIES.iter().map(|s| s.key).collect();
        assert_eq!(keys.len(), SPECIES.len());
    }

    #[test]
    fn test_name_pools_cover_declared_sexes() {
        for profile in SPECIES {
            assert!(!profile.ages.is_empty(), "{}", profile.key);
            assert!(!profile.actions.is_empty(), "{}", profile.key);
            for pool in profile.name_pools {
                assert!(profile.sexes.contains(&pool.sex), "{} {}", profile.key, pool.sex);
                assert!(!pool.names.is_empty());
            }
            if profile.trackable {
                assert!(!profile.name_pools.is_empty(), "{}", profile.key);
            }
        }
    }

    #[test]
    fn test_only_deer_carry_antlers() {
        for profile in SPECIES {
            if let Some(sex) = profile.antlered_sex {
                assert_eq!(profile.class, "deer");
                assert!(profile.sexes.contains(&sex));
                for age in profile.antlered_ages {
                    assert!(profile.ages.contains(age), "{} {}", profile.key, age);
                }
            }
        }
        let whitetail = species("whitetail").unwrap();
        assert!(whitetail.carries_antlers(Some("buck"), "mature"));
        assert!(!whitetail.carries_antlers(Some("buck"), "fawn"));
        assert!(!whitetail.carries_antlers(Some("doe"), "mature"));
        assert!(!species("nilgai").unwrap().carries_antlers(Some("bull"), "adult"));
    }

    #[test]
    fn test_vehicle_pools_non_empty() {
        for kind in VEHICLES {
            assert!(!kind.wheels.is_empty() && !kind.doors.is_empty(), "{}", kind.kind);
            assert!(!kind.makes.is_empty());
            for (_, models) in kind.makes {
                assert!(!models.is_empty());
            }
        }
    }

    #[test]
    fn test_other_classes_are_not_wildlife() {
        for other in OTHER {
            assert!(!is_wildlife_class(other.class));
            assert!(other.length_cm.0 <= other.length_cm.1);
        }
    }
}
