//! Sample Artifact Generator
//!
//! Writes a synthetic, reproducible artifact set (feature table, personal info,
//! tree-ensemble model and scaler) so the API can run without the production
//! model. Client 100004 is always present.
//!
//! Usage: sample_data [output_dir] [clients] [seed]

use anyhow::{Context, Result};
use credit_scoring_api::models::TreeEnsemble;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

const FIRST_ID: i64 = 100_002;

const FEATURES: [&str; 6] = [
    "EXT_SOURCE_2",
    "INCOME_PER_PERSON",
    "AMT_CREDIT",
    "DAYS_BIRTH",
    "DAYS_EMPLOYED",
    "CNT_CHILDREN",
];

/// Tree shapes as (feature, scaled threshold) per split, children laid out heap-style
const TREES: [[(usize, f64); 3]; 3] = [
    [(0, 0.0), (3, -0.5), (2, 0.8)],
    [(4, -0.3), (1, -0.6), (0, 1.0)],
    [(5, 0.7), (0, -1.0), (3, 0.4)],
];

/// Shrinkage applied to each leaf's log-odds
const LEARNING_RATE: f64 = 0.5;

struct Client {
    id: i64,
    features: [f64; 6],
    target: u8,
    gender: &'static str,
    family_status: &'static str,
    education: &'static str,
    owns_car: bool,
}

/// Synthetic client generator
struct ClientGenerator {
    rng: StdRng,
}

impl ClientGenerator {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn generate(&mut self, id: i64) -> Client {
        let ext_source: f64 = self.rng.gen_range(0.01..0.85);
        let children: f64 = self.rng.gen_range(0..4) as f64;
        let income: f64 = (self.rng.gen_range(40_000.0..300_000.0_f64) / (1.0 + children)).round();
        let credit: f64 = (self.rng.gen_range(45_000.0..1_500_000.0_f64) / 100.0).round() * 100.0;
        let days_birth: f64 = -(self.rng.gen_range(7_500..25_000) as f64);
        let days_employed: f64 = -(self.rng.gen_range(0..12_000) as f64);

        // default risk grows with low external score, youth and short employment
        let logit = -1.2 - 4.0 * (ext_source - 0.5) + 0.00005 * (days_birth + 16_000.0)
            + 0.0001 * (days_employed + 2_000.0)
            + 0.15 * children;
        let p = 1.0 / (1.0 + (-logit).exp());
        let target = u8::from(self.rng.gen_bool(p.clamp(0.0, 1.0)));

        Client {
            id,
            features: [ext_source, income, credit, days_birth, days_employed, children],
            target,
            gender: self.random_choice(&["M", "F"]),
            family_status: self.random_choice(&[
                "Married",
                "Single / not married",
                "Civil marriage",
                "Separated",
                "Widow",
            ]),
            education: self.random_choice(&[
                "Secondary / secondary special",
                "Higher education",
                "Incomplete higher",
                "Lower secondary",
            ]),
            owns_car: self.rng.gen_bool(0.35),
        }
    }

    fn random_choice(&mut self, choices: &[&'static str]) -> &'static str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sample_data=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let output = args.get(1).map(|s| s.as_str()).unwrap_or("artifacts");
    let count: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(300).max(3);
    let seed: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(42);

    let dir = Path::new(output);
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut generator = ClientGenerator::new(seed);
    let clients: Vec<Client> = (0..count as i64)
        .map(|i| generator.generate(FIRST_ID + i))
        .collect();

    write_features(&dir.join("df300.csv"), &clients)?;
    write_personal_info(&dir.join("personal_info.csv"), &clients)?;

    let (mean, scale) = fit_scaler(&clients);
    let scaled: Vec<[f64; 6]> = clients
        .iter()
        .map(|c| {
            let mut x = c.features;
            for (j, v) in x.iter_mut().enumerate() {
                *v = (*v - mean[j]) / scale[j];
            }
            x
        })
        .collect();
    let targets: Vec<u8> = clients.iter().map(|c| c.target).collect();

    std::fs::write(
        dir.join("scaler.json"),
        serde_json::to_string_pretty(&json!({ "mean": mean, "scale": scale }))?,
    )?;

    let model = fit_model(&scaled, &targets);
    let model_json = serde_json::to_string_pretty(&model)?;
    TreeEnsemble::from_json(&model_json).context("Generated model is invalid")?;
    std::fs::write(dir.join("saved_model.json"), model_json)?;

    let defaults = targets.iter().filter(|&&t| t == 1).count();
    info!(
        dir = %dir.display(),
        clients = count,
        defaults = defaults,
        "Sample artifacts written"
    );
    info!(
        "Serve them with SCORING__DATA__DIR={} SCORING__DATA__MODEL_FILE=saved_model.json \
         SCORING__DATA__SCALER_FILE=scaler.json",
        std::fs::canonicalize(dir)?.display()
    );

    Ok(())
}

fn write_features(path: &Path, clients: &[Client]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header = vec!["SK_ID_CURR", "TARGET"];
    header.extend(FEATURES);
    wtr.write_record(&header)?;

    for c in clients {
        let mut record = vec![c.id.to_string(), c.target.to_string()];
        record.push(format!("{:.6}", c.features[0]));
        record.push(format!("{:.1}", c.features[1]));
        record.push(format!("{:.1}", c.features[2]));
        record.extend(c.features[3..].iter().map(|v| format!("{}", *v as i64)));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_personal_info(path: &Path, clients: &[Client]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "SK_ID_CURR",
        "CODE_GENDER",
        "AGE",
        "NAME_FAMILY_STATUS",
        "NAME_EDUCATION_TYPE",
        "CNT_CHILDREN",
        "INCOME_PER_PERSON",
        "FLAG_OWN_CAR",
    ])?;

    for c in clients {
        let age = (-c.features[3] / 365.25) as i64;
        wtr.write_record([
            c.id.to_string(),
            c.gender.to_string(),
            age.to_string(),
            c.family_status.to_string(),
            c.education.to_string(),
            (c.features[5] as i64).to_string(),
            format!("{:.1}", c.features[1]),
            if c.owns_car { "True" } else { "False" }.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

fn fit_scaler(clients: &[Client]) -> (Vec<f64>, Vec<f64>) {
    let n = clients.len() as f64;
    let mean: Vec<f64> = (0..FEATURES.len())
        .map(|j| clients.iter().map(|c| c.features[j]).sum::<f64>() / n)
        .collect();
    let scale = (0..FEATURES.len())
        .map(|j| {
            let var = clients
                .iter()
                .map(|c| (c.features[j] - mean[j]).powi(2))
                .sum::<f64>()
                / n;
            if var > 0.0 {
                var.sqrt()
            } else {
                1.0
            }
        })
        .collect();
    (mean, scale)
}

fn logit(positives: f64, total: f64) -> f64 {
    // Laplace smoothing keeps empty or pure leaves finite
    let p = (positives + 1.0) / (total + 2.0);
    (p / (1.0 - p)).ln()
}

/// Fit leaf values and covers of the fixed depth-2 tree shapes
fn fit_model(scaled: &[[f64; 6]], targets: &[u8]) -> Value {
    let positives = targets.iter().filter(|&&t| t == 1).count() as f64;
    let base = logit(positives, targets.len() as f64);

    let trees: Vec<Value> = TREES
        .iter()
        .map(|splits| {
            // leaves 3..=6 reached through splits 0 -> {1, 2}
            let mut cover = [0.0_f64; 4];
            let mut hits = [0.0_f64; 4];
            for (x, &t) in scaled.iter().zip(targets) {
                let first = usize::from(x[splits[0].0] > splits[0].1);
                let second = splits[1 + first];
                let leaf = first * 2 + usize::from(x[second.0] > second.1);
                cover[leaf] += 1.0;
                hits[leaf] += f64::from(t);
            }

            let leaf = |i: usize| {
                json!({
                    "leaf_value": LEARNING_RATE * (logit(hits[i], cover[i]) - base),
                    "cover": cover[i],
                })
            };
            json!({ "nodes": [
                { "split_feature": splits[0].0, "threshold": splits[0].1, "left": 1, "right": 2,
                  "cover": cover.iter().sum::<f64>() },
                { "split_feature": splits[1].0, "threshold": splits[1].1, "left": 3, "right": 4,
                  "cover": cover[0] + cover[1] },
                { "split_feature": splits[2].0, "threshold": splits[2].1, "left": 5, "right": 6,
                  "cover": cover[2] + cover[3] },
                leaf(0), leaf(1), leaf(2), leaf(3),
            ] })
        })
        .collect();

    json!({
        "name": "sample-credit-gbm",
        "base_score": base,
        "feature_names": FEATURES,
        "trees": trees,
    })
}
