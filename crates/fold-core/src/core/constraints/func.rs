use serde::Deserialize;

/// Width of the quadratic region past the upper bound of a [`Func::Bounded`] penalty,
/// in units of its standard deviation. Beyond it the penalty grows linearly.
const BOUNDED_SWITCH: f64 = 0.5;

/// Penalty shape applied to a measured distance.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Func {
    Harmonic { x0: f64, sd: f64 },
    FlatHarmonic { x0: f64, sd: f64, tol: f64 },
    Bounded { lb: f64, ub: f64, sd: f64 },
}

impl Func {
    pub fn eval(&self, x: f64) -> f64 {
        match *self {
            Func::Harmonic { x0, sd } => {
                let z = (x - x0) / sd;
                z * z
            }
            Func::FlatHarmonic { x0, sd, tol } => {
                let excess = (x - x0).abs() - tol;
                if excess <= 0.0 {
                    0.0
                } else {
                    let z = excess / sd;
                    z * z
                }
            }
            Func::Bounded { lb, ub, sd } => {
                if x < lb {
                    let z = (lb - x) / sd;
                    z * z
                } else if x <= ub {
                    0.0
                } else {
                    let d = x - ub;
                    let switch = BOUNDED_SWITCH * sd;
                    if d <= switch {
                        let z = d / sd;
                        z * z
                    } else {
                        BOUNDED_SWITCH * BOUNDED_SWITCH + (d - switch) * 2.0 * BOUNDED_SWITCH / sd
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harmonic_is_zero_at_minimum_and_quadratic_elsewhere() {
        let f = Func::Harmonic { x0: 5.0, sd: 2.0 };
        assert_eq!(f.eval(5.0), 0.0);
        assert_eq!(f.eval(7.0), 1.0);
        assert_eq!(f.eval(1.0), 4.0);
    }

    #[test]
    fn flat_harmonic_has_a_flat_bottom() {
        let f = Func::FlatHarmonic {
            x0: 5.0,
            sd: 1.0,
            tol: 1.0,
        };
        assert_eq!(f.eval(4.2), 0.0);
        assert_eq!(f.eval(6.0), 0.0);
        assert!((f.eval(7.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bounded_switches_to_linear_above_upper_bound() {
        let f = Func::Bounded {
            lb: 2.0,
            ub: 4.0,
            sd: 1.0,
        };
        assert_eq!(f.eval(3.0), 0.0);
        assert_eq!(f.eval(1.0), 1.0);
        assert!((f.eval(4.5) - 0.25).abs() < 1e-12);
        assert!((f.eval(5.5) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn deserializes_tagged_functions() {
        let f: Func = toml::from_str("type = \"flat-harmonic\"\nx0 = 5.5\nsd = 1.0\ntol = 0.5")
            .unwrap();
        assert_eq!(
            f,
            Func::FlatHarmonic {
                x0: 5.5,
                sd: 1.0,
                tol: 0.5
            }
        );
    }
}
