//! 探索空間
//!
//! オプションの `optimize.space` はパラメータ名 → `[種類, 引数]` の対応で、
//! 引数の先頭はラベル（値は使わない）:
//!
//! | 種類 | 引数 | 値 |
//! |------|------|----|
//! | `uniform` | `[label, low, high]` | 一様分布 |
//! | `quniform` | `[label, low, high, q]` | `round(uniform / q) * q` |
//! | `loguniform` | `[label, low, high]` | `exp(uniform(low, high))` |
//! | `randint` | `[label, low, high]` | `low + randint(0, high - low)`、つまり `[low, high)` の整数 |
//! | `choice` | `[label, [options...]]` | 候補から 1 つ |

use crate::error::{IalsError, Result};
use crate::options::SpaceEntry;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// ハイパーパラメータの値
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            ParamValue::Str(_) => None,
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            ParamValue::Int(v) => Ok((*v).into()),
            ParamValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .ok_or_else(|| IalsError::Validation(format!("non-finite parameter value {v}"))),
            ParamValue::Str(s) => Ok(s.clone().into()),
        }
    }

    fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(ParamValue::Int)
                .or_else(|| n.as_f64().map(ParamValue::Float)),
            serde_json::Value::String(s) => Some(ParamValue::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(s) => f.write_str(s),
        }
    }
}

/// パラメータ名 → 値
pub type ParamSet = BTreeMap<String, ParamValue>;

/// 1 パラメータの分布
#[derive(Clone, Debug, PartialEq)]
pub enum Distribution {
    Uniform { low: f64, high: f64 },
    QUniform { low: f64, high: f64, q: f64 },
    LogUniform { low: f64, high: f64 },
    /// `[low, high)` の整数
    RandInt { low: i64, high: i64 },
    Choice { options: Vec<ParamValue> },
}

impl Distribution {
    /// `[種類, 引数]` を解釈する
    pub fn from_entry(name: &str, entry: &SpaceEntry) -> Result<Self> {
        let (kind, args) = entry;
        let bad = |what: String| {
            IalsError::Configuration(format!("invalid search space for '{name}': {what}"))
        };

        let dist = match kind.as_str() {
            "uniform" | "loguniform" => {
                let v = numeric_args(args, 2).map_err(bad)?;
                if v[0] > v[1] {
                    return Err(bad(format!("low {} > high {}", v[0], v[1])));
                }
                if kind == "uniform" {
                    Distribution::Uniform {
                        low: v[0],
                        high: v[1],
                    }
                } else {
                    Distribution::LogUniform {
                        low: v[0],
                        high: v[1],
                    }
                }
            }
            "quniform" => {
                let v = numeric_args(args, 3).map_err(bad)?;
                if v[0] > v[1] || v[2] <= 0.0 {
                    return Err(bad(format!("expected low <= high and q > 0, got {v:?}")));
                }
                Distribution::QUniform {
                    low: v[0],
                    high: v[1],
                    q: v[2],
                }
            }
            "randint" => {
                let v = numeric_args(args, 2).map_err(bad)?;
                if v.iter().any(|x| x.fract() != 0.0) {
                    return Err(bad(format!("randint bounds must be integers, got {v:?}")));
                }
                let (low, high) = (v[0] as i64, v[1] as i64);
                if high <= low {
                    return Err(bad(format!("randint needs low < high, got [{low}, {high})")));
                }
                Distribution::RandInt { low, high }
            }
            "choice" => {
                let list = match args.as_slice() {
                    [_, serde_json::Value::Array(list)] | [serde_json::Value::Array(list)] => list,
                    _ => return Err(bad("choice needs [label, [options...]]".to_string())),
                };
                let options = list
                    .iter()
                    .map(ParamValue::from_json)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| bad("choice options must be numbers or strings".to_string()))?;
                if options.is_empty() {
                    return Err(bad("choice has no options".to_string()));
                }
                Distribution::Choice { options }
            }
            other => return Err(bad(format!("unknown distribution '{other}'"))),
        };
        Ok(dist)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            Distribution::Uniform { low, high } => ParamValue::Float(uniform(rng, *low, *high)),
            Distribution::QUniform { low, high, q } => {
                ParamValue::Float((uniform(rng, *low, *high) / q).round() * q)
            }
            Distribution::LogUniform { low, high } => {
                ParamValue::Float(uniform(rng, *low, *high).exp())
            }
            Distribution::RandInt { low, high } => {
                ParamValue::Int(low + rng.random_range(0..(high - low)))
            }
            Distribution::Choice { options } => {
                options[rng.random_range(0..options.len())].clone()
            }
        }
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    low + rng.random::<f64>() * (high - low)
}

/// 先頭のラベルを除いた数値引数を `count` 個取り出す
///
/// ラベルを省略した記述（引数がちょうど `count` 個）も受け付ける。
fn numeric_args(
    args: &[serde_json::Value],
    count: usize,
) -> std::result::Result<Vec<f64>, String> {
    let nums = if args.len() == count + 1 {
        &args[1..]
    } else if args.len() == count {
        args
    } else {
        return Err(format!("expected {count} numeric arguments after the label, got {args:?}"));
    };
    nums.iter()
        .map(|v| v.as_f64().ok_or_else(|| format!("'{v}' is not a number")))
        .collect()
}

/// 解決済みの探索空間
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchSpace {
    params: BTreeMap<String, Distribution>,
}

impl SearchSpace {
    pub fn resolve(space: &BTreeMap<String, SpaceEntry>) -> Result<Self> {
        let params = space
            .iter()
            .map(|(name, entry)| Ok((name.clone(), Distribution::from_entry(name, entry)?)))
            .collect::<Result<_>>()?;
        Ok(Self { params })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// 全パラメータを独立にサンプルする
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamSet {
        self.params
            .iter()
            .map(|(name, dist)| (name.clone(), dist.sample(rng)))
            .collect()
    }
}
