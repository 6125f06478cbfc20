//! Syntax checks for the time types.
//!
//! Time values are kept as their textual representation. This module only
//! checks that the text is well-formed for the type and, if requested, for
//! the restrictions CER and DER place on it. It does not convert to or from
//! any representation of an instant.


//------------ UTCTime -------------------------------------------------------

/// Checks the syntax of a UTCTime value.
///
/// The general form is `YYMMDDhhmm[ss](Z|±hhmm)`. If `restricted` is set,
/// seconds must be present and the time must be given in UTC, i.e., the
/// form is `YYMMDDhhmmssZ`.
pub fn check_utc_time(s: &str, restricted: bool) -> Result<(), &'static str> {
    let mut parser = Parser::new(s);
    parser.digits(2, 0, 99)?;
    parser.date()?;
    parser.digits(2, 0, 23)?;
    parser.digits(2, 0, 59)?;
    if parser.peek_digit() {
        parser.digits(2, 0, 59)?;
    }
    else if restricted {
        return Err("missing seconds")
    }
    parser.zone(restricted, true)?;
    parser.finish()
}


//------------ GeneralizedTime -----------------------------------------------

/// Checks the syntax of a GeneralizedTime value.
///
/// The general form is `YYYYMMDDhh[mm[ss]][(.|,)f+][Z|±hhmm]`. If
/// `restricted` is set, minutes and seconds must be present, a fraction
/// must use a full stop and not end in zero, and the time must be given in
/// UTC.
pub fn check_generalized_time(
    s: &str, restricted: bool
) -> Result<(), &'static str> {
    let mut parser = Parser::new(s);
    parser.digits(4, 0, 9999)?;
    parser.date()?;
    parser.digits(2, 0, 23)?;
    let mut complete = false;
    if parser.peek_digit() {
        parser.digits(2, 0, 59)?;
        if parser.peek_digit() {
            parser.digits(2, 0, 59)?;
            complete = true;
        }
    }
    if restricted && !complete {
        return Err("missing minutes or seconds")
    }
    if let Some(mark) = parser.next_if(|ch| ch == b'.' || ch == b',') {
        if restricted && mark == b',' {
            return Err("fraction must use a full stop")
        }
        let fraction = parser.fraction()?;
        if restricted && fraction.ends_with('0') {
            return Err("trailing zero in fraction")
        }
    }
    parser.zone(restricted, false)?;
    parser.finish()
}


//------------ Parser --------------------------------------------------------

struct Parser<'a> {
    data: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(data: &'a str) -> Self {
        Parser { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.as_bytes().get(self.pos).copied()
    }

    fn peek_digit(&self) -> bool {
        self.peek().is_some_and(|ch| ch.is_ascii_digit())
    }

    fn next_if(&mut self, op: impl FnOnce(u8) -> bool) -> Option<u8> {
        let ch = self.peek().filter(|ch| op(*ch))?;
        self.pos += 1;
        Some(ch)
    }

    fn digits(
        &mut self, count: usize, min: u32, max: u32
    ) -> Result<u32, &'static str> {
        let mut res = 0;
        for _ in 0..count {
            let ch = self.next_if(|ch| ch.is_ascii_digit()).ok_or(
                "expected digit"
            )?;
            res = res * 10 + u32::from(ch - b'0');
        }
        if res < min || res > max {
            return Err("field out of range")
        }
        Ok(res)
    }

    fn date(&mut self) -> Result<(), &'static str> {
        let month = self.digits(2, 1, 12)?;
        let max_day = match month {
            2 => 29,
            4 | 6 | 9 | 11 => 30,
            _ => 31
        };
        self.digits(2, 1, max_day)?;
        Ok(())
    }

    fn fraction(&mut self) -> Result<&'a str, &'static str> {
        let start = self.pos;
        while self.next_if(|ch| ch.is_ascii_digit()).is_some() { }
        if start == self.pos {
            return Err("empty fraction")
        }
        Ok(self.data.get(start..self.pos).unwrap_or_default())
    }

    fn zone(
        &mut self, restricted: bool, required: bool
    ) -> Result<(), &'static str> {
        match self.peek() {
            Some(b'Z') => {
                self.pos += 1;
                Ok(())
            }
            Some(b'+') | Some(b'-') if !restricted => {
                self.pos += 1;
                self.digits(2, 0, 23)?;
                self.digits(2, 0, 59)?;
                Ok(())
            }
            None if !restricted && !required => Ok(()),
            _ => Err("missing or illegal time zone")
        }
    }

    fn finish(&self) -> Result<(), &'static str> {
        if self.pos == self.data.len() {
            Ok(())
        }
        else {
            Err("trailing characters")
        }
    }
}


//============ Tests =========================================================
