//! Path templates (spec.md §6 "Path templates").
//!
//! Each template is a printf-style format string taking exactly two
//! parameters in order: the algorithm name (`%s`) and the epoch number
//! (`%u`, optionally zero-padded, e.g. `%05u`). A template is valid iff
//! substituting a dummy `(algo = "ethash", n = 0)` produces a well-formed
//! path, mirroring `epoch.c`'s `template_valid`/`template_epoch`.

#[derive(Debug, Clone)]
pub struct PathTemplate(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Spec {
    Str,
    Uint { zero_pad_width: usize },
}

fn parse_specs(fmt: &str) -> Option<Vec<Spec>> {
    let mut specs = Vec::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        match chars.peek() {
            Some('%') => {
                chars.next();
            }
            Some('s') => {
                chars.next();
                specs.push(Spec::Str);
            }
            Some(_) => {
                let mut width = String::new();
                while let Some(&d) = chars.peek() {
                    if d == '0' && width.is_empty() {
                        width.push(d);
                        chars.next();
                    } else if d.is_ascii_digit() {
                        width.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match chars.next() {
                    Some('u') => {
                        let zero_pad_width = if width.starts_with('0') {
                            width.parse().unwrap_or(0)
                        } else {
                            0
                        };
                        specs.push(Spec::Uint { zero_pad_width });
                    }
                    _ => return None,
                }
            }
            None => return None,
        }
    }
    Some(specs)
}

fn render(fmt: &str, algo_name: &str, epoch: u32) -> Option<String> {
    let specs = parse_specs(fmt)?;
    if !matches!(specs.as_slice(), [Spec::Str, Spec::Uint { .. }]) {
        return None;
    }
    let mut out = String::with_capacity(fmt.len() + algo_name.len());
    let mut chars = fmt.chars().peekable();
    let mut spec_idx = 0;
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('s') => {
                chars.next();
                out.push_str(algo_name);
                spec_idx += 1;
            }
            Some(_) => {
                let mut width = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        width.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if chars.next() == Some('u') {
                    match width.parse::<usize>() {
                        Ok(w) if width.starts_with('0') => out.push_str(&format!("{:0width$}", epoch, width = w)),
                        _ => out.push_str(&epoch.to_string()),
                    }
                    spec_idx += 1;
                }
            }
            None => {}
        }
    }
    if spec_idx != 2 {
        return None;
    }
    Some(out)
}

impl PathTemplate {
    pub fn parse(fmt: &str) -> Option<Self> {
        render(fmt, "ethash", 0)?;
        Some(PathTemplate(fmt.to_string()))
    }

    pub fn format(&self, algo_name: &str, epoch: u32) -> String {
        render(&self.0, algo_name, epoch).expect("validated at parse time")
    }
}

pub fn template_valid(s: &str) -> bool {
    PathTemplate::parse(s).is_some()
}
