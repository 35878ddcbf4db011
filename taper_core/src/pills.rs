//! Pill combination and dosing frequency solver.
//!
//! Turns a milligram target into tablet counts the way change is made from
//! coins: strongest tablets first, then at most one half tablet for whatever
//! is left. The result is deterministic but not guaranteed to use the fewest
//! tablets.

use crate::dose::{Dose, Tablets};
use crate::types::{DoseSplit, Frequency, FrequencyPreference, PillCombination, TimedDose};

/// Greedy tablet combination for `dose` from the available `strengths`
///
/// Whole tablets are taken strongest first. A remainder smaller than the
/// weakest tablet becomes one half tablet of the strength closest to it
/// (ties go to the stronger tablet).
pub fn get_combination(dose: Dose, strengths: &[Dose]) -> PillCombination {
    let mut sorted: Vec<Dose> = strengths.iter().copied().filter(|s| s.is_positive()).collect();
    sorted.sort_by(|a, b| b.cmp(a));
    sorted.dedup();

    let mut combination = PillCombination::default();
    let mut remaining = dose;

    for &strength in &sorted {
        let count = remaining.hundredths() / strength.hundredths();
        if count < 1 {
            continue;
        }
        let Some(tablets) = Tablets::checked_whole(count) else {
            tracing::warn!("{} tablets of {} mg is too many to count", count, strength);
            return combination;
        };
        combination.add(strength, tablets);
        remaining = remaining - Dose::from_hundredths(count * strength.hundredths());
    }

    if let Some(&smallest) = sorted.last() {
        if remaining.is_positive() && remaining < smallest {
            let mut closest = sorted[0];
            for &strength in &sorted[1..] {
                if distance(strength, remaining) < distance(closest, remaining) {
                    closest = strength;
                }
            }
            combination.add(closest, Tablets::HALF);
        }
    }

    combination
}

fn distance(a: Dose, b: Dose) -> i64 {
    (a.hundredths() - b.hundredths()).abs()
}

/// Whether the greedy combination reproduces `dose` on the 0.01 mg grid
pub fn can_achieve(dose: Dose, strengths: &[Dose]) -> bool {
    get_combination(dose, strengths).reconstructs(dose)
}

/// Split `total` into `parts` equal doses on the 0.01 mg grid
///
/// Each part is `total / parts` rounded; the rounding remainder goes to the
/// last part so the parts always sum to `total`.
pub fn even_split(total: Dose, parts: u32) -> Vec<Dose> {
    if parts == 0 {
        return Vec::new();
    }

    let base = total.div_rounded(parts);
    let mut chunks = vec![base; parts as usize];
    let assigned: Dose = chunks.iter().copied().sum();
    if let Some(last) = chunks.last_mut() {
        *last += total - assigned;
    }
    chunks
}

/// Split a daily dose across administration times
///
/// A fixed frequency is applied as given. `Auto` picks the first of
/// once/bid/tid where every sub-dose is exactly achievable, and falls back
/// to a best-effort tid split when none is.
pub fn split_dose(
    dose: Dose,
    strengths: &[Dose],
    preference: FrequencyPreference,
) -> (DoseSplit, Frequency) {
    let frequency = match preference {
        FrequencyPreference::Fixed(frequency) => frequency,
        FrequencyPreference::Auto => resolve_frequency(dose, strengths),
    };
    (assign_split(dose, strengths, frequency), frequency)
}

fn resolve_frequency(dose: Dose, strengths: &[Dose]) -> Frequency {
    if can_achieve(dose, strengths) {
        return Frequency::Once;
    }

    for frequency in [Frequency::Bid, Frequency::Tid] {
        if even_split(dose, frequency.parts())
            .into_iter()
            .all(|part| can_achieve(part, strengths))
        {
            return frequency;
        }
    }

    tracing::debug!("No exact split for {} mg, using best-effort tid", dose);
    Frequency::Tid
}

fn assign_split(dose: Dose, strengths: &[Dose], frequency: Frequency) -> DoseSplit {
    let doses = frequency
        .times()
        .iter()
        .zip(even_split(dose, frequency.parts()))
        .map(|(&time, part)| TimedDose {
            time,
            dose: part,
            combination: get_combination(part, strengths),
        })
        .collect();
    DoseSplit { doses }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AdminTime;

    fn mg(values: &[f64]) -> Vec<Dose> {
        values.iter().copied().map(Dose::from_mg).collect()
    }

    #[test]
    fn test_uncountable_tablets_leave_dose_unachieved() {
        // more 0.01 mg tablets than a u32 can count
        let dose = Dose::from_hundredths(1 << 40);
        let strengths = [Dose::from_hundredths(1)];
        let combo = get_combination(dose, &strengths);
        assert!(combo.is_empty());
        assert!(!can_achieve(dose, &strengths));
    }

    #[test]
    fn test_whole_tablets_largest_first() {
        let combo = get_combination(Dose::from_mg(7.0), &mg(&[10.0, 5.0, 2.0]));
        assert_eq!(combo.entries.len(), 2);
        assert_eq!(combo.tablets_of(Dose::from_mg(5.0)), Some(Tablets::whole(1)));
        assert_eq!(combo.tablets_of(Dose::from_mg(2.0)), Some(Tablets::whole(1)));
        assert!(combo.reconstructs(Dose::from_mg(7.0)));
    }

    #[test]
    fn test_strength_order_does_not_matter() {
        let a = get_combination(Dose::from_mg(17.0), &mg(&[2.0, 10.0, 5.0]));
        let b = get_combination(Dose::from_mg(17.0), &mg(&[10.0, 5.0, 2.0]));
        assert_eq!(a, b);
        assert_eq!(a.entries[0].strength, Dose::from_mg(10.0));
    }

    #[test]
    fn test_remainder_becomes_half_tablet() {
        let combo = get_combination(Dose::from_mg(3.0), &mg(&[10.0, 5.0, 2.0]));
        assert_eq!(
            combo.tablets_of(Dose::from_mg(2.0)),
            Some(Tablets::whole(1) + Tablets::HALF)
        );
        assert!(combo.reconstructs(Dose::from_mg(3.0)));
    }

    #[test]
    fn test_unreachable_remainder_is_best_effort() {
        // 0.5 mg cannot be built from diazepam tablets; half a 2 mg is closest
        let combo = get_combination(Dose::from_mg(0.5), &mg(&[10.0, 5.0, 2.0]));
        assert_eq!(combo.tablets_of(Dose::from_mg(2.0)), Some(Tablets::HALF));
        assert!(!combo.reconstructs(Dose::from_mg(0.5)));
        assert_eq!(combo.total_mg(), 1.0);
    }

    #[test]
    fn test_quarter_strength_half_tablet() {
        let strengths = mg(&[2.0, 1.0, 0.5, 0.25]);
        let combo = get_combination(Dose::from_mg(0.125), &strengths);
        assert_eq!(combo.tablets_of(Dose::from_mg(0.25)), Some(Tablets::HALF));
        assert_eq!(combo.total_mg(), 0.125);
        assert!(can_achieve(Dose::from_mg(3.75), &strengths));
    }

    #[test]
    fn test_can_achieve_is_exact() {
        let strengths = mg(&[10.0, 5.0, 2.0]);
        assert!(can_achieve(Dose::from_mg(7.0), &strengths));
        assert!(can_achieve(Dose::from_mg(1.0), &strengths));
        assert!(!can_achieve(Dose::from_mg(4.5), &strengths));
        assert!(!can_achieve(Dose::from_mg(7.01), &strengths));
    }

    #[test]
    fn test_can_achieve_rounds_half_hundredths() {
        // ½ × 0.25 mg = 0.125 mg, which lands on 0.12 mg
        let strengths = mg(&[0.25]);
        assert!(can_achieve(Dose::from_mg(0.12), &strengths));
        assert!(!can_achieve(Dose::from_mg(0.13), &strengths));
        // 1½ × 0.25 mg = 0.375 mg, which lands on 0.38 mg
        assert!(can_achieve(Dose::from_mg(0.38), &strengths));
        assert!(!can_achieve(Dose::from_mg(0.37), &strengths));
    }

    #[test]
    fn test_even_split_sums_to_total() {
        for (total, parts) in [(10.0, 3), (7.0, 2), (0.05, 3), (19.99, 3), (0.5, 1)] {
            let total = Dose::from_mg(total);
            let split = even_split(total, parts);
            assert_eq!(split.len(), parts as usize);
            assert_eq!(split.iter().copied().sum::<Dose>(), total);
        }
    }

    #[test]
    fn test_even_split_remainder_on_last() {
        let split = even_split(Dose::from_mg(10.0), 3);
        assert_eq!(split, mg(&[3.33, 3.33, 3.34]));
    }

    #[test]
    fn test_auto_prefers_once() {
        let (split, freq) = split_dose(
            Dose::from_mg(7.0),
            &mg(&[10.0, 5.0, 2.0]),
            FrequencyPreference::Auto,
        );
        assert_eq!(freq, Frequency::Once);
        assert_eq!(split.doses.len(), 1);
        assert_eq!(split.doses[0].time, AdminTime::Am);
        assert!(split.doses[0].combination.reconstructs(Dose::from_mg(7.0)));
    }

    #[test]
    fn test_auto_falls_to_bid() {
        // 12 mg from [10, 6] greedily is 10 + half of 6; two 6 mg doses are exact
        let (split, freq) = split_dose(Dose::from_mg(12.0), &mg(&[10.0, 6.0]), FrequencyPreference::Auto);
        assert_eq!(freq, Frequency::Bid);
        let times: Vec<_> = split.iter().map(|d| d.time).collect();
        assert_eq!(times, vec![AdminTime::Am, AdminTime::Pm]);
        for part in split.iter() {
            assert_eq!(part.combination.tablets_of(Dose::from_mg(6.0)), Some(Tablets::whole(1)));
        }
    }

    #[test]
    fn test_auto_falls_to_tid() {
        let (split, freq) = split_dose(Dose::from_mg(9.0), &mg(&[4.0, 3.0]), FrequencyPreference::Auto);
        assert_eq!(freq, Frequency::Tid);
        assert_eq!(split.doses.len(), 3);
        assert!(split.iter().all(|d| d.combination.reconstructs(Dose::from_mg(3.0))));
    }

    #[test]
    fn test_auto_best_effort_tid() {
        let (split, freq) = split_dose(
            Dose::from_mg(4.5),
            &mg(&[10.0, 5.0, 2.0]),
            FrequencyPreference::Auto,
        );
        assert_eq!(freq, Frequency::Tid);
        assert_eq!(split.total(), Dose::from_mg(4.5));
        assert_eq!(split.doses[2].time, AdminTime::Hs);
    }

    #[test]
    fn test_fixed_frequency_is_respected() {
        let (split, freq) = split_dose(
            Dose::from_mg(10.0),
            &mg(&[10.0, 5.0, 2.0]),
            FrequencyPreference::Fixed(Frequency::Bid),
        );
        assert_eq!(freq, Frequency::Bid);
        assert_eq!(split.doses[0].dose, Dose::from_mg(5.0));
        assert_eq!(split.doses[1].dose, Dose::from_mg(5.0));
    }
}
