use std::collections::BTreeSet;

/// Run numbers of one subject.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RunList(pub Vec<u32>);

/// Parses `1,2`, `1-3,5` or `NA`.
///
/// `NA` is for data without run labels in the file names; first-level results are still
/// written under `run1`, so it maps to run 1.
pub fn parse_runs(s: &str) -> Result<RunList, &'static str> {
    const ERR: &str = "runs must look like `1,2`, `1-3` or `NA`";
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if s == "NA" {
        return Ok(RunList(vec![1]));
    }
    let mut set = BTreeSet::<u32>::new();
    for ranges in s.split(',') {
        let mut d_iter = ranges.split('-');
        let d1: u32 = d_iter.next().ok_or(ERR)?.parse().map_err(|_| ERR)?;
        let d2 = d_iter.next();
        if let Some(d2) = d2 {
            let d2: u32 = d2.parse().map_err(|_| ERR)?;
            if d2 < d1 {
                return Err(ERR);
            }
            set.extend(d1..=d2);
            if d_iter.next().is_some() {
                return Err(ERR);
            }
        } else {
            set.insert(d1);
        }
    }
    Ok(RunList(set.into_iter().collect()))
}
