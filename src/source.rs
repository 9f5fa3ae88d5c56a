//! Candidate passphrase stream
//!
//! Deterministic, logically infinite sequence of human-plausible
//! passphrases. The stream restarts from the beginning after a process
//! restart; the ledger rejects anything already tested, so re-emission
//! is cheap and harmless.
//!
//! Families, in order:
//! 1. Common words and famous phrases
//! 2. Small numbers (1..999)
//! 3. word+number / number+word combos
//! 4. Years and `bitcoin<year>` variants
//! 5. Two-word concatenations
//! 6. Unbounded numbered tail (keeps the stream infinite)

/// Words and phrases people have actually used as brain wallets
const WORDS: &[&str] = &[
    "password", "123456", "password123", "admin", "bitcoin", "satoshi",
    "nakamoto", "crypto", "blockchain", "wallet", "secret", "private",
    "key", "money", "cash", "gold", "silver", "test", "demo", "sample",
    "hello", "world", "user", "root", "god", "love", "family", "home",
    "work", "life", "happy", "lucky", "winner", "champion", "success",
    "moon", "hodl", "freedom", "trust",
    "correct horse battery staple",
    "to be or not to be",
    "the quick brown fox",
];

/// Bases for the number-suffix/prefix family
const COMBO_WORDS: &[&str] = &["password", "bitcoin", "crypto", "wallet"];

const YEAR_START: u32 = 1980;
const YEAR_END: u32 = 2025; // exclusive

#[derive(Debug, Clone)]
enum Phase {
    Words { idx: usize },
    Numbers { n: u32 },
    Combos { word: usize, n: u32, flipped: bool },
    Years { year: u32, form: u8 },
    Pairs { i: usize, j: usize },
    Tail { idx: usize, round: u64 },
}

/// Lazy, infinite candidate generator
#[derive(Debug, Clone)]
pub struct PassphraseStream {
    phase: Phase,
}

impl PassphraseStream {
    pub fn new() -> Self {
        Self {
            phase: Phase::Words { idx: 0 },
        }
    }

    /// Next candidate. Never exhausts.
    pub fn next_candidate(&mut self) -> String {
        loop {
            match self.phase {
                Phase::Words { idx } => {
                    if idx < WORDS.len() {
                        self.phase = Phase::Words { idx: idx + 1 };
                        return WORDS[idx].to_string();
                    }
                    self.phase = Phase::Numbers { n: 1 };
                }
                Phase::Numbers { n } => {
                    if n < 1000 {
                        self.phase = Phase::Numbers { n: n + 1 };
                        return n.to_string();
                    }
                    self.phase = Phase::Combos { word: 0, n: 1, flipped: false };
                }
                Phase::Combos { word, n, flipped } => {
                    if word >= COMBO_WORDS.len() {
                        self.phase = Phase::Years { year: YEAR_START, form: 0 };
                        continue;
                    }
                    let out = if flipped {
                        format!("{}{}", n, COMBO_WORDS[word])
                    } else {
                        format!("{}{}", COMBO_WORDS[word], n)
                    };
                    self.phase = if !flipped {
                        Phase::Combos { word, n, flipped: true }
                    } else if n + 1 < 100 {
                        Phase::Combos { word, n: n + 1, flipped: false }
                    } else {
                        Phase::Combos { word: word + 1, n: 1, flipped: false }
                    };
                    return out;
                }
                Phase::Years { year, form } => {
                    if year >= YEAR_END {
                        self.phase = Phase::Pairs { i: 0, j: 0 };
                        continue;
                    }
                    let out = match form {
                        0 => year.to_string(),
                        1 => format!("bitcoin{}", year),
                        _ => format!("{}bitcoin", year),
                    };
                    self.phase = if form < 2 {
                        Phase::Years { year, form: form + 1 }
                    } else {
                        Phase::Years { year: year + 1, form: 0 }
                    };
                    return out;
                }
                Phase::Pairs { i, j } => {
                    if i >= WORDS.len() {
                        self.phase = Phase::Tail { idx: 0, round: 1000 };
                        continue;
                    }
                    let out = format!("{}{}", WORDS[i], WORDS[j]);
                    self.phase = if j + 1 < WORDS.len() {
                        Phase::Pairs { i, j: j + 1 }
                    } else {
                        Phase::Pairs { i: i + 1, j: 0 }
                    };
                    return out;
                }
                Phase::Tail { idx, round } => {
                    let out = format!("{}{}", WORDS[idx], round);
                    self.phase = if idx + 1 < WORDS.len() {
                        Phase::Tail { idx: idx + 1, round }
                    } else {
                        Phase::Tail { idx: 0, round: round + 1 }
                    };
                    return out;
                }
            }
        }
    }
}

impl Default for PassphraseStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for PassphraseStream {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        Some(self.next_candidate())
    }
}
