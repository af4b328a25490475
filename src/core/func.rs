// Field-function calls and the compact format-string argument encoding.
//
// A format string has one character per argument: `i` integer, `d` float,
// `c` string. Unknown characters are skipped and consume no argument, so
// "i_d" takes an integer then a float. Arguments left over after the format
// is exhausted are ignored.
use crate::core::bridge::Session;
use crate::core::error::{Error, ErrorKind};
use crate::core::marshal::{Arg, ArgTag, Decode, Method, Request, Response};

/// Result of a field function that ran without raising.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FuncOutcome {
    Number(f64),
    /// The function returned something Lua cannot read as a number.
    NotNumber { type_name: &'static str },
}

impl FuncOutcome {
    /// The numeric result, or NaN when the function returned a non-number.
    pub fn value(&self) -> f64 {
        match self {
            FuncOutcome::Number(value) => *value,
            FuncOutcome::NotNumber { .. } => f64::NAN,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, FuncOutcome::Number(_))
    }
}

impl Decode for FuncOutcome {
    const ARITY: usize = 1;

    fn decode(response: &mut Response<'_>) -> Result<Self, Error> {
        Ok(match response.pop_coerced_number()? {
            Ok(value) => FuncOutcome::Number(value),
            Err(type_name) => FuncOutcome::NotNumber { type_name },
        })
    }
}

impl Session {
    /// Calls a field function loaded by [`Session::func_init`].
    pub fn func_call(&mut self, name: &str, args: &[Arg]) -> Result<FuncOutcome, Error> {
        let request = Request::new(Method::FuncCall)
            .arg(name)
            .extend(args.iter().cloned());
        let outcome: FuncOutcome = self.invoke(request)?;
        if let FuncOutcome::NotNumber { type_name } = outcome {
            tracing::warn!(function = name, returned = type_name, "function returned non-number");
        }
        Ok(outcome)
    }

    /// Format-string form of [`Session::func_call`].
    pub fn func_call_format<S>(
        &mut self,
        name: &str,
        format: &str,
        source: &mut S,
    ) -> Result<FuncOutcome, Error>
    where
        S: ArgSource + ?Sized,
    {
        let args = collect_args(format, source)?;
        self.func_call(name, &args)
    }
}

/// Supplies one argument per recognised format character, in order.
pub trait ArgSource {
    fn take(&mut self, tag: ArgTag) -> Result<Arg, Error>;
}

pub fn format_tags(format: &str) -> impl Iterator<Item = ArgTag> + '_ {
    format.chars().filter_map(|c| {
        let tag = ArgTag::from_format_char(c);
        if tag.is_none() {
            tracing::debug!(format_char = %c, "skipping unknown format character");
        }
        tag
    })
}

pub fn collect_args<S>(format: &str, source: &mut S) -> Result<Vec<Arg>, Error>
where
    S: ArgSource + ?Sized,
{
    format_tags(format).map(|tag| source.take(tag)).collect()
}

impl ArgSource for std::slice::Iter<'_, Arg> {
    fn take(&mut self, tag: ArgTag) -> Result<Arg, Error> {
        let arg = self.next().ok_or_else(|| too_few(tag))?;
        if arg.tag() != tag {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "format character '{}' expects {:?}, got {:?} argument",
                tag.format_char(),
                tag,
                arg.tag()
            )));
        }
        Ok(arg.clone())
    }
}

/// Arguments given as text (command line), parsed per format character.
pub struct TextArgs<'a> {
    values: std::slice::Iter<'a, String>,
}

impl<'a> TextArgs<'a> {
    pub fn new(values: &'a [String]) -> Self {
        Self {
            values: values.iter(),
        }
    }
}

impl ArgSource for TextArgs<'_> {
    fn take(&mut self, tag: ArgTag) -> Result<Arg, Error> {
        let text = self.values.next().ok_or_else(|| too_few(tag))?;
        match tag {
            ArgTag::Int => text.parse::<i64>().map(Arg::Int).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("'{text}' is not an integer"))
                    .with_source(err)
            }),
            ArgTag::Float => text.parse::<f64>().map(Arg::Float).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("'{text}' is not a number"))
                    .with_source(err)
            }),
            ArgTag::Str => Ok(Arg::Str(text.clone())),
        }
    }
}

pub(crate) fn too_few(tag: ArgTag) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!(
            "format character '{}' has no matching argument",
            tag.format_char()
        ))
        .with_hint("Supply one argument per i/d/c character in the format string.")
}
