//! Shared fixtures: seeded synthetic student tables

#![allow(dead_code)]

use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::path::Path;

pub const GENDERS: [&str; 2] = ["female", "male"];
pub const GROUPS: [&str; 5] = ["group A", "group B", "group C", "group D", "group E"];
pub const EDUCATION: [&str; 6] = [
    "some high school",
    "high school",
    "some college",
    "associate's degree",
    "bachelor's degree",
    "master's degree",
];
pub const LUNCH: [&str; 2] = ["standard", "free/reduced"];
pub const PREPARATION: [&str; 2] = ["none", "completed"];

/// Students whose math score follows their reading score, lunch and gender.
///
/// With `learnable = false` the math score is pure noise.
pub fn student_frame(n: usize, seed: u64, learnable: bool) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut gender = Vec::with_capacity(n);
    let mut group = Vec::with_capacity(n);
    let mut education = Vec::with_capacity(n);
    let mut lunch = Vec::with_capacity(n);
    let mut preparation = Vec::with_capacity(n);
    let mut reading = Vec::with_capacity(n);
    let mut writing = Vec::with_capacity(n);
    let mut math = Vec::with_capacity(n);

    for i in 0..n {
        // Cycle through categories so every value appears in any sizeable sample
        let g = GENDERS[i % GENDERS.len()];
        let l = LUNCH[(i / 2) % LUNCH.len()];
        let r: f64 = rng.gen_range(30.0..100.0);
        let w = (r + rng.gen_range(-5.0..5.0)).clamp(0.0, 100.0);
        let m = if learnable {
            0.9 * r + if g == "male" { 6.0 } else { 0.0 } - if l == "free/reduced" { 8.0 } else { 0.0 }
                + rng.gen_range(-2.0..2.0)
        } else {
            rng.gen_range(0.0..100.0)
        };

        gender.push(g);
        group.push(GROUPS[i % GROUPS.len()]);
        education.push(*EDUCATION.choose(&mut rng).unwrap_or(&EDUCATION[0]));
        lunch.push(l);
        preparation.push(PREPARATION[(i / 3) % PREPARATION.len()]);
        reading.push(r.round());
        writing.push(w.round());
        math.push(m.round());
    }

    df!(
        "gender" => gender,
        "race_ethnicity" => group,
        "parental_level_of_education" => education,
        "lunch" => lunch,
        "test_preparation_course" => preparation,
        "math_score" => math,
        "reading_score" => reading,
        "writing_score" => writing
    )
    .unwrap()
}

pub fn write_csv(df: &DataFrame, path: &Path) {
    let mut file = File::create(path).unwrap();
    let mut df = df.clone();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
}
