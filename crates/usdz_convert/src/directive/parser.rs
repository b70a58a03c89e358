//! Directive parser.
//!
//! Walks the token stream once, building a [`ConversionRequest`]. Material
//! directives accumulate into the current [`MaterialSpec`]; `-m` starts a
//! new one. Nothing here touches the filesystem except reading `-f` files.

use std::path::{Path, PathBuf};

use crate::directive::tokenizer::{expand_arguments, read_directive_file};
use crate::error::{ConvertError, ConvertResult};
use crate::material::{ChannelRole, Channels, Input, MaterialSpec, TextureMap, DEFAULT_TEX_COORD_SET};

/// Animation loop metadata requested on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    Loop,
    NoLoop,
}

/// A fully parsed conversion request.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub output: Option<PathBuf>,

    /// Last directive file loaded with `-f`
    pub directive_file: Option<PathBuf>,

    pub verbose: bool,
    pub copy_textures: bool,
    pub ios12: bool,
    pub loop_mode: Option<LoopMode>,

    pub url: Option<String>,
    pub copyright: Option<String>,
    pub meters_per_unit: Option<f64>,

    /// Material specs in directive order; the first is always anonymous
    pub materials: Vec<MaterialSpec>,
}

/// What the command line asked for.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
    Convert(ConversionRequest),

    /// `-h` / `--help`
    ShowHelp,

    /// Empty argument list
    ShowUsage,
}

/// Parse raw command-line arguments.
pub fn parse_arguments<I, S>(args: I) -> ConvertResult<ParseOutcome>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tokens = expand_arguments(args);
    if tokens.is_empty() {
        return Ok(ParseOutcome::ShowUsage);
    }
    DirectiveParser::new(tokens).parse()
}

fn is_number(token: &str) -> bool {
    token.parse::<f64>().is_ok()
}

fn parse_floats(tokens: &[String]) -> Vec<f32> {
    tokens.iter().filter_map(|t| t.parse::<f32>().ok()).collect()
}

struct DirectiveParser {
    tokens: Vec<String>,
    index: usize,
    tex_coord_set: String,

    input: Option<String>,
    output: Option<String>,
    directive_file: Option<PathBuf>,
    verbose: bool,
    copy_textures: bool,
    ios12: bool,
    wants_loop: bool,
    wants_no_loop: bool,
    url: Option<String>,
    copyright: Option<String>,
    meters_per_unit: Option<f64>,
    materials: Vec<MaterialSpec>,
}

impl DirectiveParser {
    fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            index: 0,
            tex_coord_set: DEFAULT_TEX_COORD_SET.to_string(),
            input: None,
            output: None,
            directive_file: None,
            verbose: false,
            copy_textures: false,
            ios12: false,
            wants_loop: false,
            wants_no_loop: false,
            url: None,
            copyright: None,
            meters_per_unit: None,
            materials: vec![MaterialSpec::anonymous()],
        }
    }

    fn parse(mut self) -> ConvertResult<ParseOutcome> {
        while self.index < self.tokens.len() {
            let token = self.tokens[self.index].clone();

            if token.starts_with('-') {
                match token.as_str() {
                    "-v" => self.verbose = true,
                    "-copytextures" => self.copy_textures = true,
                    "-iOS12" | "-ios12" => self.ios12 = true,
                    "-copyright" => {
                        let copyright = self.parameter(&token)?;
                        log::info!("{}", copyright);
                        self.copyright = Some(copyright);
                    }
                    "-url" => {
                        let url = self.parameter(&token)?;
                        log::info!("{}", url);
                        self.url = Some(url);
                    }
                    "-metersPerUnit" => {
                        let value = self.parameter(&token)?;
                        match value.parse::<f64>() {
                            Ok(mpu) if mpu > 0.0 => self.meters_per_unit = Some(mpu),
                            _ => {
                                return Err(ConvertError::usage(format!(
                                    "expected positive float value for argument {}",
                                    token
                                )))
                            }
                        }
                    }
                    "-m" => {
                        let name = self.parameter(&token)?;
                        self.materials.push(MaterialSpec::named(&name));
                        self.tex_coord_set = DEFAULT_TEX_COORD_SET.to_string();
                    }
                    "-texCoordSet" => {
                        let set = self.parameter(&token)?;
                        self.current_material().tex_coord_set = set.clone();
                        self.tex_coord_set = set;
                    }
                    "-loop" | "--loop" => self.wants_loop = true,
                    "-no-loop" | "--no-loop" => self.wants_no_loop = true,
                    "-h" | "--help" => return Ok(ParseOutcome::ShowHelp),
                    "-f" => {
                        let name = self.parameter(&token)?;
                        self.include_file(&name)?;
                    }
                    _ => match ChannelRole::from_flag(&token) {
                        Some(role) => self.parse_channel(role, &token)?,
                        None => return Err(ConvertError::usage(format!("unknown argument {}", token))),
                    },
                }
            } else if self.input.is_none() {
                self.input = Some(token);
            } else if self.output.is_none() {
                self.output = Some(token);
            } else {
                log::info!("Input file: {}", self.input.as_deref().unwrap_or(""));
                log::info!("Output file: {}", self.output.as_deref().unwrap_or(""));
                return Err(ConvertError::usage(format!("unknown argument {}", token)));
            }

            self.index += 1;
        }

        self.finish()
    }

    fn finish(self) -> ConvertResult<ParseOutcome> {
        let input = match self.input {
            Some(input) if !input.is_empty() => input,
            _ => return Err(ConvertError::usage("too few arguments")),
        };

        let loop_mode = match (self.wants_loop, self.wants_no_loop) {
            (true, true) => {
                return Err(ConvertError::usage("can't use -loop and -no-loop flags together"));
            }
            (true, false) => Some(LoopMode::Loop),
            (false, true) => Some(LoopMode::NoLoop),
            (false, false) => None,
        };

        Ok(ParseOutcome::Convert(ConversionRequest {
            input: PathBuf::from(input),
            output: self.output.map(PathBuf::from),
            directive_file: self.directive_file,
            verbose: self.verbose,
            copy_textures: self.copy_textures,
            ios12: self.ios12,
            loop_mode,
            url: self.url,
            copyright: self.copyright,
            meters_per_unit: self.meters_per_unit,
            materials: self.materials,
        }))
    }

    fn current_material(&mut self) -> &mut MaterialSpec {
        if self.materials.is_empty() {
            self.materials.push(MaterialSpec::anonymous());
        }
        let last = self.materials.len() - 1;
        &mut self.materials[last]
    }

    /// Consume `count` value tokens following the current directive.
    fn parameters(&mut self, count: usize, directive: &str) -> ConvertResult<Vec<String>> {
        if self.index + count >= self.tokens.len() {
            return Err(ConvertError::usage(format!(
                "argument {} needs more parameters",
                directive
            )));
        }

        let values = self.tokens[self.index + 1..=self.index + count].to_vec();
        for value in &values {
            if value.starts_with('-') && !is_number(value) {
                return Err(ConvertError::usage(format!(
                    "unexpected parameter {} for argument {}",
                    value, directive
                )));
            }
        }
        self.index += count;
        Ok(values)
    }

    fn parameter(&mut self, directive: &str) -> ConvertResult<String> {
        let mut values = self.parameters(1, directive)?;
        Ok(values.remove(0))
    }

    /// Whether the next `count` tokens are all numbers.
    fn next_are_numbers(&self, count: usize) -> bool {
        if self.index + count >= self.tokens.len() {
            return false;
        }
        self.tokens[self.index + 1..=self.index + count]
            .iter()
            .all(|t| is_number(t))
    }

    fn parse_channel(&mut self, role: ChannelRole, directive: &str) -> ConvertResult<()> {
        let count = role.components();

        if self.next_are_numbers(count) {
            let values = parse_floats(&self.parameters(count, directive)?);
            let outside = role.out_of_range(&values);
            if !outside.is_empty() {
                let (min, max) = role.info().range;
                log::warn!(
                    "values {:?} for argument {} are outside of range [{}, {}]",
                    outside,
                    directive,
                    min,
                    max
                );
            }
            self.current_material().set_input(role, Input::Constant(values));
            return Ok(());
        }

        let first = self.parameter(directive)?;
        let (selector, file) = match Channels::from_selector(&first) {
            Some(channels) => (Some(channels), self.parameter(directive)?),
            None => (None, first),
        };

        let channels = match selector {
            Some(channels) if role.accepts(channels) => channels,
            Some(channels) => {
                log::warn!("invalid channel {} for argument {}", channels, directive);
                role.default_channels()
            }
            None => role.default_channels(),
        };

        let fallback = if self.next_are_numbers(count) {
            Some(parse_floats(&self.parameters(count, directive)?))
        } else {
            None
        };

        let map = TextureMap {
            file,
            channels,
            fallback,
            tex_coord_set: self.tex_coord_set.clone(),
        };
        self.current_material().set_input(role, Input::Texture(map));
        Ok(())
    }

    /// Splice the tokens of a directive file right after the `-f <name>` pair.
    fn include_file(&mut self, name: &str) -> ConvertResult<()> {
        let path = self
            .resolve_directive_file(name)
            .ok_or_else(|| ConvertError::usage(format!("failed to load argument file: {}", name)))?;

        let tokens = read_directive_file(&path)?;
        let at = self.index + 1;
        self.tokens.splice(at..at, tokens);
        self.directive_file = Some(path);
        Ok(())
    }

    fn resolve_directive_file(&self, name: &str) -> Option<PathBuf> {
        let literal = Path::new(name);
        if literal.is_file() {
            return Some(literal.to_path_buf());
        }
        let input = self.input.as_deref()?;
        let dir = Path::new(input).parent()?;
        let candidate = dir.join(name);
        candidate.is_file().then_some(candidate)
    }
}
