//! Built-in partition plan data
//!
//! Every list here can be replaced from the `[partition]` config section.

/// Broad star bands used when a single job covers the whole space
pub const SINGLE_JOB_STAR_CUT_POINTS: &[u64] = &[0, 3, 9, 26, 81, 301];

/// Star cut points: single-star buckets up to 25, then roughly geometric
pub const STAR_CUT_POINTS: &[u64] = &[
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25,
    26, 28, 30, 32, 35, 38, 42, 46, 51, 56, 63, 71, 80, 90, 101, 116, 133, 153, 176, 203, 234,
    271, 314, 365, 426, 498, 583, 683, 801, 939, 1101, 1291, 1516, 1781, 2091, 2458, 2891, 3401,
    4001, 4701, 5521, 6491, 7631, 8971, 10551, 12411, 14601, 17161, 20171, 23701, 27881, 32791,
    38561, 45351,
];

pub const LANGUAGES: &[&str] = &[
    "javascript", "python", "java", "typescript", "go", "rust", "php", "c++", "c#", "ruby",
    "swift", "kotlin", "scala", "dart", "r", "objective-c", "perl", "haskell", "lua", "clojure",
    "f#", "erlang", "elixir", "crystal", "nim", "julia", "zig", "v", "assembly", "shell",
    "powershell", "makefile", "dockerfile", "html", "css", "scss", "less", "vue", "svelte",
    "coffeescript", "livescript", "ocaml", "racket", "scheme", "forth", "prolog", "cobol",
    "fortran", "pascal", "ada", "vhdl", "verilog", "matlab", "mathematica", "tex", "nix",
];

/// Creation date cut points: yearly, then half-yearly, quarterly, monthly
pub const CREATED_CUT_POINTS: &[&str] = &[
    "2017-01-01", "2018-01-01", "2018-07-01", "2019-01-01", "2019-07-01", "2020-01-01",
    "2020-07-01", "2021-01-01", "2021-04-01", "2021-07-01", "2021-10-01", "2022-01-01",
    "2022-04-01", "2022-07-01", "2022-10-01", "2023-01-01", "2023-04-01", "2023-07-01",
    "2023-10-01", "2024-01-01", "2024-02-01", "2024-03-01", "2024-04-01", "2024-05-01",
    "2024-06-01", "2024-07-01", "2024-08-01", "2024-09-01", "2024-10-01", "2024-11-01",
    "2024-12-01",
];

pub const LICENSES: &[&str] = &[
    "mit", "apache-2.0", "gpl-3.0", "bsd-2-clause", "bsd-3-clause", "isc", "unlicense",
    "lgpl-2.1",
];

pub const TOPICS: &[&str] = &[
    "api", "cli", "framework", "library", "tool", "web", "mobile", "game", "machine-learning",
    "data", "security", "blockchain", "iot", "ai", "database", "monitoring", "testing",
    "automation", "devops", "cloud", "frontend", "backend", "fullstack", "microservices",
    "serverless", "kubernetes", "docker", "react", "vue", "angular",
];

/// Repository size cut points in kilobytes
pub const SIZE_CUT_POINTS: &[u64] = &[0, 5, 16, 51, 151, 501, 1501, 5001];
