//! `ParseF15`: the route-description state machine.
//!
//! Diagnostics never abort the parse — an offending token is recorded
//! and skipped, and the parser carries on from whatever state it was in,
//! grounded in the reference `F15Parser.parse_field_15`'s error-recovery
//! loop (it never raises; it appends to an error list and continues).

use crate::classify::{
    lat_long_range_errors, split_speed_level, split_speed_level_level, split_speed_level_plus, split_speed_vfr,
    BaseKind, SubKind, DEFAULT_VFR_LEVEL,
};
use crate::route::{ExtractedRouteSequence, RouteElement, Rules, Span};
use crate::token::{tokenize, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AfterFirstSpeedLevel,
    AfterPoint,
    AfterAtsRoute,
    AfterDct,
    AfterStayN,
    AfterStayNSlash,
    AfterCruiseClimb,
    AfterCruiseClimbSlash,
    AfterCruiseClimbPoint,
    AfterCruiseClimbPointSlash,
    AfterTruncate,
    InBreak,
    Done,
}

struct Ctx {
    rules: Rules,
    speed: String,
    level: String,
    break_opened_by: Option<SubKind>,
    break_index: Option<usize>,
    /// Whether a `BREAK_END` marker has been seen since the current break
    /// was opened. A trailing/slash-followed `POINT` only closes the
    /// break once this is true — otherwise it is still free text.
    break_end_seen: bool,
    cruise_climb_index: Option<usize>,
    route_seen: bool,
}

fn span_of(token: &Token) -> Span {
    Span {
        start: token.start(),
        end: token.end(),
    }
}

fn break_section_name(sub: SubKind) -> &'static str {
    match sub {
        SubKind::Vfr => "VFR",
        SubKind::Oat => "OAT",
        SubKind::IfpStop => "IFPSTOP",
        _ => "VFR",
    }
}

/// The flight-rules regime a `BREAK_START` marker puts the route into.
fn rules_for_break_start(sub: SubKind) -> Rules {
    match sub {
        SubKind::Oat => Rules::Oat,
        SubKind::IfpStop => Rules::Ifps,
        _ => Rules::Vfr,
    }
}

/// Parse a Field 15 route description into an [`ExtractedRouteSequence`].
/// Never panics and never returns an `Err` — malformed input produces
/// diagnostics in the returned sequence's `errors()`, not a failure.
pub fn parse_f15(source: &str) -> ExtractedRouteSequence {
    let stream = tokenize(source);
    let toks = stream.all();
    let mut ers = ExtractedRouteSequence::new();

    if toks.is_empty() {
        ers.append_error("Field 15 is empty", Span { start: 0, end: 0 });
        return ers;
    }

    let mut ctx = Ctx {
        rules: Rules::Ifr,
        speed: String::new(),
        level: String::new(),
        break_opened_by: None,
        break_index: None,
        break_end_seen: false,
        cruise_climb_index: None,
        route_seen: false,
    };

    let first = &toks[0];
    let mut state;
    let mut i = 1usize;

    match first.base_kind() {
        BaseKind::SpeedLevel => {
            let (speed, level) = split_speed_level(first.text()).unwrap_or_default();
            ctx.speed = speed;
            ctx.level = level;
            ctx.rules = Rules::Ifr;
            ers.adep_mut().set_rules(Rules::Ifr);
            ers.adep_mut().set_speed_level(&ctx.speed, &ctx.level);
            state = State::AfterFirstSpeedLevel;
        }
        BaseKind::SpeedVfr => {
            let speed = split_speed_vfr(first.text()).unwrap_or_default();
            ctx.speed = speed;
            ctx.level = DEFAULT_VFR_LEVEL.to_string();
            ctx.rules = Rules::Vfr;
            ers.adep_mut().set_rules(Rules::Vfr);
            ers.adep_mut().set_speed_level(&ctx.speed, &ctx.level);
            open_break(&mut ers, &mut ctx, SubKind::Vfr, first);
            state = State::InBreak;
        }
        _ => {
            ers.append_error(
                format!("The first Field 15 element must be a SPEED/LEVEL and not '{}'", first.text()),
                span_of(first),
            );
            ers.adep_mut().set_rules(Rules::Ifr);
            ers.ades_mut().set_rules(Rules::Ifr);
            return ers;
        }
    }

    while i < toks.len() && state != State::Done {
        i = match state {
            State::AfterFirstSpeedLevel => step_after_first_speed_level(toks, i, &mut ers, &mut ctx, &mut state),
            State::AfterPoint => step_after_point(toks, i, &mut ers, &mut ctx, &mut state),
            State::AfterAtsRoute => step_after_ats_route(toks, i, &mut ers, &mut ctx, &mut state),
            State::AfterDct => step_after_dct(toks, i, &mut ers, &mut ctx, &mut state),
            State::AfterStayN => step_after_stay_n(toks, i, &mut ers, &mut state),
            State::AfterStayNSlash => step_after_stay_n_slash(toks, i, &mut ers, &mut ctx, &mut state),
            State::AfterCruiseClimb => break,
            State::AfterCruiseClimbSlash => step_cruise_climb_slash(toks, i, &mut ers, &mut ctx, &mut state),
            State::AfterCruiseClimbPoint => step_cruise_climb_point(toks, i, &mut ers, &mut ctx, &mut state),
            State::AfterCruiseClimbPointSlash => {
                step_cruise_climb_point_slash(toks, i, &mut ers, &mut ctx, &mut state)
            }
            State::AfterTruncate => step_after_truncate(toks, i, &mut ers, &mut state),
            State::InBreak => step_in_break(toks, i, &mut ers, &mut ctx, &mut state),
            State::Done => break,
        };
    }

    // End-of-stream cleanup for states that were mid-sub-structure when
    // the token list ran out.
    if i >= toks.len() && state != State::Done {
        handle_end_of_stream(toks, &mut ers, &mut ctx, state);
    }

    if !ctx.route_seen && ers.number_of_errors() == 0 {
        ers.append_error("Field 15 contains no route description", Span { start: 0, end: 0 });
    }

    ers.ades_mut().set_rules(ctx.rules);
    ers
}

fn open_break(ers: &mut ExtractedRouteSequence, ctx: &mut Ctx, sub: SubKind, token: &Token) {
    let name = break_section_name(sub);
    let element = RouteElement::new(name, ctx.rules, &ctx.speed, &ctx.level, span_of(token));
    ers.append_element(element);
    ctx.break_index = Some(ers.len_including_sentinels() - 2);
    ctx.break_opened_by = Some(sub);
    ctx.break_end_seen = false;
    ctx.route_seen = true;
}

fn append_point(ers: &mut ExtractedRouteSequence, ctx: &mut Ctx, tok: &Token) -> usize {
    if matches!(tok.base_kind(), BaseKind::LatLong | BaseKind::LatLongBearingDistance) {
        for message in lat_long_range_errors(tok.text()) {
            ers.append_error(message, span_of(tok));
        }
    }
    let element = RouteElement::new(tok.text(), ctx.rules, &ctx.speed, &ctx.level, span_of(tok));
    ers.append_element(element);
    ctx.route_seen = true;
    ers.len_including_sentinels() - 2
}

/// Resolve a bare `C` (cruise/climb) token by looking at the token that
/// follows it before deciding whether it becomes a route element at all.
/// The reference only commits `C` to the ERS when the following token is
/// one `after_point` would itself accept as a continuation; for every
/// other (reject-class) follow-up the `C` is dropped entirely and the
/// follow-up token is diagnosed exactly as `after_point` would diagnose
/// it had `C` never appeared.
fn resolve_bare_c(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let c_tok = &toks[i];
    match toks.get(i + 1) {
        None => {
            ctx.cruise_climb_index = Some(append_point(ers, ctx, c_tok));
            *state = State::AfterCruiseClimb;
            i + 1
        }
        Some(next) => match next.base_kind() {
            BaseKind::Slash => {
                ctx.cruise_climb_index = Some(append_point(ers, ctx, c_tok));
                *state = State::AfterCruiseClimbSlash;
                i + 2
            }
            BaseKind::BreakStart
            | BaseKind::Dct
            | BaseKind::Point
            | BaseKind::SidStar
            | BaseKind::Truncate
            | BaseKind::AtsRoute
            | BaseKind::CruiseClimb
            | BaseKind::Star
            | BaseKind::LatLong
            | BaseKind::LatLongBearingDistance
            | BaseKind::StayN => {
                ctx.cruise_climb_index = Some(append_point(ers, ctx, c_tok));
                *state = State::AfterPoint;
                step_after_point(toks, i + 1, ers, ctx, state)
            }
            _ => {
                *state = State::AfterPoint;
                step_after_point(toks, i + 1, ers, ctx, state)
            }
        },
    }
}

// ---------------------------------------------------------------------
// after_first_speed_level
// ---------------------------------------------------------------------

fn step_after_first_speed_level(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let tok = &toks[i];
    match tok.base_kind() {
        BaseKind::Dct => {
            *state = State::AfterDct;
            i + 1
        }
        BaseKind::Point | BaseKind::LatLong | BaseKind::LatLongBearingDistance | BaseKind::SidStar => {
            append_point(ers, ctx, tok);
            *state = State::AfterPoint;
            i + 1
        }
        BaseKind::Sid | BaseKind::Star => {
            append_point(ers, ctx, tok);
            *state = State::AfterPoint;
            i + 1
        }
        BaseKind::Truncate => {
            *state = State::AfterTruncate;
            i + 1
        }
        BaseKind::CruiseClimb => resolve_bare_c(toks, i, ers, ctx, state),
        BaseKind::Slash => {
            // Erroneous-element resync: `/` immediately followed by
            // SPEED_LEVEL or SPEED_VFR overwrites the pending first
            // element in place.
            if let Some(next) = toks.get(i + 1) {
                match next.base_kind() {
                    BaseKind::SpeedLevel => {
                        let (speed, level) = split_speed_level(next.text()).unwrap_or_default();
                        ctx.speed = speed;
                        ctx.level = level;
                        ctx.rules = Rules::Ifr;
                        ers.adep_mut().set_rules(Rules::Ifr);
                        ers.adep_mut().set_speed_level(&ctx.speed, &ctx.level);
                        return i + 2;
                    }
                    BaseKind::SpeedVfr => {
                        let speed = split_speed_vfr(next.text()).unwrap_or_default();
                        ctx.speed = speed;
                        ctx.level = DEFAULT_VFR_LEVEL.to_string();
                        ctx.rules = Rules::Vfr;
                        ers.adep_mut().set_rules(Rules::Vfr);
                        ers.adep_mut().set_speed_level(&ctx.speed, &ctx.level);
                        open_break(ers, ctx, SubKind::Vfr, next);
                        *state = State::InBreak;
                        return i + 2;
                    }
                    BaseKind::Point => {
                        // A plain point-shaped token after the slash:
                        // silently consume the slash and continue.
                        return i + 1;
                    }
                    BaseKind::AtsRoute => {
                        ers.append_error(
                            format!("'/' not expected preceding '{}'", next.text()),
                            span_of(next),
                        );
                        return i + 2;
                    }
                    _ => {}
                }
            } else {
                ers.append_error("Field 15 cannot end with the '/' element", span_of(tok));
                return i + 1;
            }
            ers.append_error(
                format!("The first SPEED/LEVEL cannot be followed by the element '{}'", tok.text()),
                span_of(tok),
            );
            i + 1
        }
        BaseKind::AtsRoute => {
            ers.append_error(
                format!("Expecting SID or DPF after first SPEED/LEVEL element instead of '{}'", tok.text()),
                span_of(tok),
            );
            i + 1
        }
        _ => {
            ers.append_error(
                format!("The first SPEED/LEVEL cannot be followed by the element '{}'", tok.text()),
                span_of(tok),
            );
            i + 1
        }
    }
}

// ---------------------------------------------------------------------
// after_point
// ---------------------------------------------------------------------

fn step_after_point(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let tok = &toks[i];
    let prev_was_lat_long = i > 0 && matches!(toks[i - 1].base_kind(), BaseKind::LatLong | BaseKind::LatLongBearingDistance);
    match tok.base_kind() {
        BaseKind::AtsRoute => {
            if prev_was_lat_long {
                ers.append_error(
                    format!("ATS route '{}' cannot follow a Lat/Long point", tok.text()),
                    span_of(tok),
                );
                i + 1
            } else {
                append_point(ers, ctx, tok);
                *state = State::AfterAtsRoute;
                i + 1
            }
        }
        BaseKind::Dct => {
            *state = State::AfterDct;
            i + 1
        }
        BaseKind::Point | BaseKind::LatLong | BaseKind::LatLongBearingDistance | BaseKind::SidStar => {
            append_point(ers, ctx, tok);
            i + 1
        }
        BaseKind::CruiseClimb => resolve_bare_c(toks, i, ers, ctx, state),
        BaseKind::StayN => {
            // The STAYn element is only committed to the ERS once the
            // trailing '/HHMM' fully validates (see step_after_stay_n_slash);
            // the reference never retains a STAYn without it.
            *state = State::AfterStayN;
            i + 1
        }
        BaseKind::Truncate => {
            *state = State::AfterTruncate;
            i + 1
        }
        BaseKind::BreakStart => {
            ctx.rules = rules_for_break_start(tok.sub_kind());
            open_break(ers, ctx, tok.sub_kind(), tok);
            *state = State::InBreak;
            i + 1
        }
        BaseKind::BreakEnd => {
            let section = match tok.sub_kind() {
                SubKind::Ifr => "VFR",
                SubKind::Gat => "OAT",
                SubKind::IfpStart => "IFPSTOP",
                _ => "VFR",
            };
            ers.append_error(
                format!("No {section} section preceding this '{}' rule change indicator", tok.text()),
                span_of(tok),
            );
            i + 1
        }
        BaseKind::SpeedLevel | BaseKind::SpeedVfr => {
            ers.append_error(format!("Expecting '/' before '{}'", tok.text()), span_of(tok));
            i + 1
        }
        BaseKind::SpeedLevelLevel | BaseKind::SpeedLevelPlus => {
            ers.append_error(format!("Expecting 'C/POINT/' before '{}'", tok.text()), span_of(tok));
            i + 1
        }
        BaseKind::StayTime => {
            ers.append_error(format!("Expecting the keyword 'STAY' before '{}'", tok.text()), span_of(tok));
            i + 1
        }
        BaseKind::TooLong => {
            ers.append_error(format!("Element '{}' is too long for a Field 15 Element", tok.text()), span_of(tok));
            i + 1
        }
        BaseKind::Slash => step_after_point_slash(toks, i, ers, ctx, state),
        _ => {
            ers.append_error(
                format!("The element '{}' is an unrecognised Field 15 element", tok.text()),
                span_of(tok),
            );
            i + 1
        }
    }
}

/// A bare `/` directly after a point "begins rule-change speed/level"
/// (spec §4.4): outside any break, `POINT/SPEED_LEVEL` or
/// `POINT/SPEED_VFR` updates the current speed/level (or opens a VFR
/// break) in place, retroactively rewriting the speed/level already
/// recorded on the just-emitted point. Mirrors the closing half of
/// `step_in_break`'s point-then-slash mechanic.
fn step_after_point_slash(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let tok = &toks[i];
    let point_idx = ers.len_including_sentinels().saturating_sub(2);
    match toks.get(i + 1) {
        None => {
            ers.append_error("Field 15 is incomplete, expecting additional data after the final '/'", span_of(tok));
            *state = State::Done;
            i + 1
        }
        Some(nxt) if nxt.base_kind() == BaseKind::SpeedLevel => {
            let (speed, level) = split_speed_level(nxt.text()).unwrap_or_default();
            ctx.speed = speed;
            ctx.level = level;
            ers.element_mut(point_idx).set_speed_level(&ctx.speed, &ctx.level);
            *state = State::AfterPoint;
            i + 2
        }
        Some(nxt) if nxt.base_kind() == BaseKind::SpeedVfr => {
            let speed = split_speed_vfr(nxt.text()).unwrap_or_default();
            ctx.speed = speed;
            ctx.level = DEFAULT_VFR_LEVEL.to_string();
            ctx.rules = Rules::Vfr;
            ers.element_mut(point_idx).set_rules(Rules::Vfr);
            ers.element_mut(point_idx).set_speed_level(&ctx.speed, &ctx.level);
            open_break(ers, ctx, SubKind::Vfr, nxt);
            *state = State::InBreak;
            i + 2
        }
        Some(nxt) => {
            ers.append_error(
                format!("Expecting SPEED/LEVEL or SPEED/VFR after '/' instead of '{}'", nxt.text()),
                span_of(nxt),
            );
            *state = State::AfterPoint;
            i + 2
        }
    }
}

// ---------------------------------------------------------------------
// after_ats_route
// ---------------------------------------------------------------------

fn step_after_ats_route(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let tok = &toks[i];
    match tok.base_kind() {
        BaseKind::Point | BaseKind::LatLong | BaseKind::LatLongBearingDistance => {
            append_point(ers, ctx, tok);
            *state = State::AfterPoint;
            i + 1
        }
        BaseKind::CruiseClimb => resolve_bare_c(toks, i, ers, ctx, state),
        BaseKind::Truncate => {
            *state = State::AfterTruncate;
            i + 1
        }
        BaseKind::AtsRoute => {
            ers.append_error(
                format!("Add crossing point between previous ATS route and '{}'", tok.text()),
                span_of(tok),
            );
            i + 1
        }
        BaseKind::Star | BaseKind::SidStar => {
            ers.append_error(
                format!("Add APF between previous ATS route and STAR '{}'", tok.text()),
                span_of(tok),
            );
            i + 1
        }
        BaseKind::Sid => {
            ers.append_error(
                format!(
                    "SID '{}' must follow the first SPEED/ALTITUDE and cannot appear anywhere else in field 15",
                    tok.text()
                ),
                span_of(tok),
            );
            i + 1
        }
        BaseKind::Dct => {
            ers.append_error(
                "Cannot go direct ('DCT') from an ATS route element, must be preceded by a point",
                span_of(tok),
            );
            i + 1
        }
        BaseKind::SpeedLevel => {
            ers.append_error(format!("The SPEED/LEVEL '{}' cannot follow an ATS route", tok.text()), span_of(tok));
            i + 1
        }
        BaseKind::SpeedLevelLevel | BaseKind::SpeedLevelPlus => {
            ers.append_error(format!("Expecting 'C/POINT/' before '{}'", tok.text()), span_of(tok));
            i + 1
        }
        BaseKind::Slash => {
            ers.append_error("Expecting a PRP after an ATS route instead of '/'", span_of(tok));
            i + 1
        }
        BaseKind::BreakStart | BaseKind::SpeedVfr => {
            ers.append_error(
                format!("Rule change '{}' cannot occur following an ATS route element", tok.text()),
                span_of(tok),
            );
            i + 1
        }
        BaseKind::BreakEnd => {
            let section = match tok.sub_kind() {
                SubKind::Ifr => "VFR",
                SubKind::Gat => "OAT",
                SubKind::IfpStart => "IFPSTOP",
                _ => "VFR",
            };
            ers.append_error(
                format!("No {section} section preceding this '{}' rule change indicator", tok.text()),
                span_of(tok),
            );
            i + 1
        }
        BaseKind::StayN => {
            ers.append_error(format!("'{}' must be preceded by a point", tok.text()), span_of(tok));
            i + 1
        }
        BaseKind::StayTime => {
            ers.append_error(format!("Expecting the keyword 'STAY' before '{}'", tok.text()), span_of(tok));
            i + 1
        }
        BaseKind::TooLong => {
            ers.append_error(format!("Element '{}' is too long for a Field 15 Element", tok.text()), span_of(tok));
            i + 1
        }
        _ => {
            ers.append_error(
                format!("The element '{}' is an unrecognised Field 15 element", tok.text()),
                span_of(tok),
            );
            i + 1
        }
    }
}

// ---------------------------------------------------------------------
// after_dct
// ---------------------------------------------------------------------

fn step_after_dct(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let tok = &toks[i];
    match tok.base_kind() {
        BaseKind::Point | BaseKind::LatLong | BaseKind::LatLongBearingDistance => {
            append_point(ers, ctx, tok);
            *state = State::AfterPoint;
            i + 1
        }
        BaseKind::CruiseClimb => resolve_bare_c(toks, i, ers, ctx, state),
        BaseKind::Truncate => {
            *state = State::AfterTruncate;
            i + 1
        }
        _ => {
            ers.append_error(format!("A 'DCT' must be followed by a point instead of '{}'", tok.text()), span_of(tok));
            i + 1
        }
    }
}

// ---------------------------------------------------------------------
// after_stay_n / after_stay_n_slash
// ---------------------------------------------------------------------

fn step_after_stay_n(toks: &[Token], i: usize, ers: &mut ExtractedRouteSequence, state: &mut State) -> usize {
    let tok = &toks[i];
    if tok.base_kind() == BaseKind::Slash {
        *state = State::AfterStayNSlash;
        i + 1
    } else {
        ers.append_error(format!("Expecting STAY time as '/HHMM' after '{}'", toks[i - 1].text()), span_of(tok));
        *state = State::AfterPoint;
        i
    }
}

fn step_after_stay_n_slash(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let tok = &toks[i];
    if tok.base_kind() == BaseKind::StayTime {
        // Only a valid '/HHMM' completion commits the STAYn token itself
        // to the ERS, at the point it was read (i - 2).
        append_point(ers, ctx, &toks[i - 2]);
        *state = State::AfterPoint;
        i + 1
    } else {
        ers.append_error("Expecting HHMM token following STAYx/ element", span_of(tok));
        *state = State::AfterPoint;
        i
    }
}

// ---------------------------------------------------------------------
// cruise/climb
// ---------------------------------------------------------------------

fn step_cruise_climb_slash(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let tok = &toks[i];
    if tok.base_kind() == BaseKind::Point {
        if let Some(idx) = ctx.cruise_climb_index {
            *ers.element_mut(idx) = RouteElement::new(tok.text(), ctx.rules, &ctx.speed, &ctx.level, span_of(tok));
            ctx.cruise_climb_index = Some(idx);
        }
        *state = State::AfterCruiseClimbPoint;
        i + 1
    } else {
        ers.append_error(
            "Expecting point / speed / altitude / altitude after start of Cruise/Climb indicator 'C/'",
            span_of(tok),
        );
        *state = State::AfterPoint;
        i
    }
}

fn step_cruise_climb_point(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let tok = &toks[i];
    if tok.base_kind() == BaseKind::Slash {
        *state = State::AfterCruiseClimbPointSlash;
        i + 1
    } else {
        let point_text = ctx
            .cruise_climb_index
            .and_then(|idx| ers.element_at(idx).map(|e| e.point_name().to_string()))
            .unwrap_or_default();
        ers.append_error(
            format!("Expecting speed / altitude / altitude after start of Cruise/Climb indicator 'C/{point_text}/'"),
            span_of(tok),
        );
        *state = State::AfterPoint;
        i
    }
}

fn step_cruise_climb_point_slash(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let tok = &toks[i];
    match tok.base_kind() {
        BaseKind::SpeedLevelLevel => {
            if let Some((speed, first_level, _second_level)) = split_speed_level_level(tok.text()) {
                ctx.speed = speed;
                ctx.level = first_level;
                if let Some(idx) = ctx.cruise_climb_index {
                    ers.element_mut(idx).set_speed_level(&ctx.speed, &ctx.level);
                }
            }
            *state = State::AfterPoint;
            i + 1
        }
        BaseKind::SpeedLevelPlus => {
            if let Some((speed, level)) = split_speed_level_plus(tok.text()) {
                ctx.speed = speed;
                ctx.level = level;
                if let Some(idx) = ctx.cruise_climb_index {
                    ers.element_mut(idx).set_speed_level(&ctx.speed, &ctx.level);
                }
            }
            *state = State::AfterPoint;
            i + 1
        }
        _ => {
            let point_text = ctx
                .cruise_climb_index
                .and_then(|idx| ers.element_at(idx).map(|e| e.point_name().to_string()))
                .unwrap_or_default();
            ers.append_error(
                format!("Expecting speed / altitude / altitude after start of Cruise/Climb indicator 'C/{point_text}/'"),
                span_of(tok),
            );
            *state = State::AfterPoint;
            i
        }
    }
}

// ---------------------------------------------------------------------
// after_truncate
// ---------------------------------------------------------------------

fn step_after_truncate(toks: &[Token], i: usize, ers: &mut ExtractedRouteSequence, state: &mut State) -> usize {
    let tok = &toks[i];
    ers.append_error(
        format!("Expecting end of field 15 after truncation indicator 'T' instead od '{}'", tok.text()),
        span_of(tok),
    );
    *state = State::Done;
    i + 1
}

// ---------------------------------------------------------------------
// in_break
// ---------------------------------------------------------------------

fn step_in_break(
    toks: &[Token],
    i: usize,
    ers: &mut ExtractedRouteSequence,
    ctx: &mut Ctx,
    state: &mut State,
) -> usize {
    let tok = &toks[i];
    let is_last = i == toks.len() - 1;
    let followed_by_slash = toks.get(i + 1).map(|n| n.base_kind() == BaseKind::Slash).unwrap_or(false);
    let is_point_like = matches!(tok.base_kind(), BaseKind::Point | BaseKind::LatLong | BaseKind::LatLongBearingDistance);

    if is_point_like && ctx.break_end_seen && (is_last || followed_by_slash) {
        let opened_by = ctx.break_opened_by.unwrap_or(SubKind::Vfr);
        let point_idx = append_point(ers, ctx, tok);
        ctx.rules = Rules::Ifr;
        ers.element_mut(point_idx).set_rules(Rules::Ifr);

        if is_last {
            if opened_by == SubKind::Vfr {
                ers.append_error(
                    format!("Expecting '/SPEED/LEVEL' following '{}' to complete rule change to IFR", tok.text()),
                    span_of(tok),
                );
            }
            *state = State::Done;
            return i + 1;
        }

        // followed_by_slash
        let slash_idx = i + 1;
        let after_slash = toks.get(slash_idx + 1);
        match after_slash {
            None => {
                ers.append_error(
                    "Field 15 is incomplete, expecting additional data after the final '/'",
                    span_of(&toks[slash_idx]),
                );
                if opened_by == SubKind::Vfr {
                    ers.append_error(
                        format!("Expecting '/SPEED/LEVEL' following '{}' to complete rule change to IFR", tok.text()),
                        span_of(tok),
                    );
                }
                *state = State::Done;
                slash_idx + 1
            }
            Some(nxt) if nxt.base_kind() == BaseKind::SpeedLevel => {
                let (speed, level) = split_speed_level(nxt.text()).unwrap_or_default();
                ctx.speed = speed;
                ctx.level = level;
                ers.element_mut(point_idx).set_speed_level(&ctx.speed, &ctx.level);
                *state = State::AfterPoint;
                slash_idx + 2
            }
            Some(nxt) if nxt.base_kind() == BaseKind::SpeedVfr => {
                let speed = split_speed_vfr(nxt.text()).unwrap_or_default();
                ctx.speed = speed;
                ctx.level = DEFAULT_VFR_LEVEL.to_string();
                ctx.rules = Rules::Vfr;
                ers.element_mut(point_idx).set_rules(Rules::Vfr);
                ers.element_mut(point_idx).set_speed_level(&ctx.speed, &ctx.level);
                open_break(ers, ctx, SubKind::Vfr, nxt);
                *state = State::InBreak;
                slash_idx + 2
            }
            Some(nxt) => {
                ers.append_error(
                    format!("Expecting SPEED/LEVEL or SPEED/VFR after '/' instead of '{}'", nxt.text()),
                    span_of(nxt),
                );
                if opened_by == SubKind::Vfr {
                    ers.append_error(
                        format!("Expecting '/SPEED/LEVEL' following '{}' to complete rule change to IFR", tok.text()),
                        span_of(tok),
                    );
                }
                *state = State::AfterPoint;
                slash_idx + 2
            }
        }
    } else {
        if tok.base_kind() == BaseKind::BreakEnd {
            ctx.break_end_seen = true;
        }
        if let Some(idx) = ctx.break_index {
            ers.element_mut(idx).push_break_text(tok.text());
        }
        i + 1
    }
}

fn handle_end_of_stream(toks: &[Token], ers: &mut ExtractedRouteSequence, ctx: &mut Ctx, state: State) {
    let last = toks.last();
    match state {
        State::AfterDct => {
            // A 'DCT' as the very last token has nothing to be direct
            // to; the reference implementation still emits it as its
            // own terminal RouteElement rather than flagging an error.
            if let Some(last) = last {
                let element = RouteElement::new("DCT", ctx.rules, &ctx.speed, &ctx.level, span_of(last));
                ers.append_element(element);
                ctx.route_seen = true;
            }
        }
        State::AfterStayN => {
            if let Some(last) = last {
                ers.append_error(
                    format!("Expecting STAY time as '/HHMM' after '{}'", last.text()),
                    span_of(last),
                );
            }
        }
        State::AfterStayNSlash => {
            if let Some(last) = last {
                ers.append_error(
                    "Time value as HHMM token missing after '/'",
                    span_of(last),
                );
            }
        }
        State::AfterCruiseClimbSlash => {
            if let Some(last) = last {
                ers.append_error(
                    "Expecting point / speed / altitude / altitude after start of Cruise/Climb indicator 'C/'",
                    span_of(last),
                );
            }
        }
        State::AfterCruiseClimbPointSlash => {
            let point_text = ctx
                .cruise_climb_index
                .and_then(|idx| ers.element_at(idx).map(|e| e.point_name().to_string()))
                .unwrap_or_default();
            if let Some(last) = last {
                ers.append_error(
                    format!(
                        "Expecting speed / altitude / altitude after start of Cruise/Climb indicator 'C/{point_text}/'"
                    ),
                    span_of(last),
                );
            }
        }
        State::AfterCruiseClimbPoint => {
            let point_text = ctx
                .cruise_climb_index
                .and_then(|idx| ers.element_at(idx).map(|e| e.point_name().to_string()))
                .unwrap_or_default();
            if let Some(last) = last {
                ers.append_error(
                    format!(
                        "Expecting point / speed / altitude / altitude after start of Cruise/Climb indicator 'C/{point_text}'"
                    ),
                    span_of(last),
                );
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_is_an_error() {
        let ers = parse_f15("");
        assert_eq!(ers.number_of_errors(), 1);
        assert_eq!(ers.errors()[0].message(), "Field 15 is empty");
    }

    #[test]
    fn first_token_must_be_speed_level() {
        let ers = parse_f15("DCT PNT");
        assert_eq!(ers.number_of_errors(), 1);
        assert_eq!(
            ers.errors()[0].message(),
            "The first Field 15 element must be a SPEED/LEVEL and not 'DCT'"
        );
    }

    #[test]
    fn simple_dct_route_has_no_errors() {
        let ers = parse_f15("N0450F350 DCT PNT");
        assert_eq!(ers.number_of_errors(), 0);
        assert_eq!(ers.number_of_elements(), 3);
        assert_eq!(ers.element_at(1).unwrap().point_name(), "PNT");
        assert_eq!(ers.element_at(1).unwrap().rules(), Rules::Ifr);
    }

    #[test]
    fn ats_route_between_points() {
        let ers = parse_f15("N0450F350 PNT B9 LNZ2R DCT ABCDE");
        assert_eq!(ers.number_of_errors(), 0);
        let names: Vec<&str> = ers.elements().iter().map(RouteElement::point_name).collect();
        assert_eq!(names, vec!["ADEP", "PNT", "B9", "LNZ2R", "ABCDE", "ADES"]);
    }

    #[test]
    fn truncation_must_be_last() {
        let ers = parse_f15("N0450F350 PNT T DCT");
        assert_eq!(ers.number_of_errors(), 1);
        assert_eq!(
            ers.errors()[0].message(),
            "Expecting end of field 15 after truncation indicator 'T' instead od 'DCT'"
        );
    }

    #[test]
    fn vfr_break_closes_on_trailing_point_with_error() {
        let ers = parse_f15("N0450F350 PNT VFR THIS IS VFR TEXT IFR ABC");
        assert_eq!(ers.number_of_errors(), 1);
        assert_eq!(
            ers.errors()[0].message(),
            "Expecting '/SPEED/LEVEL' following 'ABC' to complete rule change to IFR"
        );
        assert_eq!(ers.last_element().rules(), Rules::Ifr);
    }

    #[test]
    fn oat_break_closes_on_trailing_point_without_error() {
        let ers = parse_f15("N0450F350 PNT OAT THIS IS OAT TEXT GAT ABC");
        assert_eq!(ers.number_of_errors(), 0);
    }

    #[test]
    fn vfr_break_closes_cleanly_with_slash_speed_level() {
        let ers = parse_f15("N0450F350 PNT VFR TEXT IFR ABC/N0400F200 DCT XYZ");
        assert_eq!(ers.number_of_errors(), 0);
        assert_eq!(ers.last_element().rules(), Rules::Ifr);
    }

    #[test]
    fn vfr_break_not_closed_by_point_followed_by_word() {
        let ers = parse_f15("N0450F350 PNT VFR TEXT IFR PNT ABC DCT");
        assert_eq!(ers.number_of_errors(), 0);
        assert_eq!(ers.last_element().rules(), Rules::Vfr);
    }

    #[test]
    fn stray_break_end_without_open_break_is_an_error() {
        let ers = parse_f15("N0450F350 PNT IFR DCT ABC");
        assert_eq!(ers.number_of_errors(), 1);
        assert_eq!(
            ers.errors()[0].message(),
            "No VFR section preceding this 'IFR' rule change indicator"
        );
    }

    #[test]
    fn dct_requires_a_point_after_it() {
        let ers = parse_f15("N0450F350 PNT DCT B9");
        assert_eq!(ers.number_of_errors(), 1);
        assert_eq!(ers.errors()[0].message(), "A 'DCT' must be followed by a point instead of 'B9'");
    }

    #[test]
    fn ats_route_cannot_follow_lat_long_point() {
        let ers = parse_f15("N0450F350 23N179E B9");
        assert_eq!(ers.number_of_errors(), 1);
        assert_eq!(ers.errors()[0].message(), "ATS route 'B9' cannot follow a Lat/Long point");
    }

    #[test]
    fn terminal_slash_is_flagged() {
        let ers = parse_f15("N0450F350 PNT /");
        assert_eq!(ers.number_of_errors(), 1);
        assert_eq!(ers.errors()[0].message(), "Field 15 is incomplete, expecting additional data after the final '/'");
    }

    #[test]
    fn bare_speed_vfr_has_no_spurious_no_route_error() {
        let ers = parse_f15("N0450VFR");
        assert_eq!(ers.number_of_errors(), 0);
        assert_eq!(ers.number_of_elements(), 3);
        assert_eq!(format!("{}", ers.element_at(0).unwrap()), "ADEP VFR N0450 F050");
        assert_eq!(format!("{}", ers.element_at(1).unwrap()), "VFR VFR N0450 F050");
        assert_eq!(ers.last_element().rules(), Rules::Vfr);
    }

    #[test]
    fn trailing_dct_with_nothing_after_becomes_its_own_element() {
        let ers = parse_f15("N0450F350 DCT");
        assert_eq!(ers.number_of_errors(), 0);
        assert_eq!(ers.number_of_elements(), 3);
        assert_eq!(format!("{}", ers.element_at(1).unwrap()), "DCT IFR N0450 F350");
    }

    #[test]
    fn lat_long_range_errors_are_reported_for_both_axes() {
        let ers = parse_f15("N0450M0825 91N181E");
        assert_eq!(ers.number_of_errors(), 2);
        assert_eq!(
            ers.errors()[0].message(),
            "Latitude degree value must be 0 to 90 instead of '91N181E'"
        );
        assert_eq!(
            ers.errors()[1].message(),
            "Longitude degree value must be 0 to 180 instead of '91N181E'"
        );
        assert_eq!(format!("{}", ers.element_at(1).unwrap()), "91N181E IFR N0450 M0825");
    }

    #[test]
    fn point_slash_speed_level_updates_in_place_outside_any_break() {
        let ers = parse_f15("N0450F350 PNT ABC/N0400F200 DCT XYZ");
        assert_eq!(ers.number_of_errors(), 0);
        assert_eq!(format!("{}", ers.element_at(2).unwrap()), "ABC IFR N0400 F200");
        assert_eq!(format!("{}", ers.element_at(3).unwrap()), "XYZ IFR N0400 F200");
    }

    #[test]
    fn point_slash_speed_vfr_opens_a_break_outside_any_prior_break() {
        let ers = parse_f15("N0450F350 PNT ABC/N0100VFR TEXT IFR XYZ/N0200F100");
        assert_eq!(ers.number_of_errors(), 0);
        assert_eq!(format!("{}", ers.element_at(2).unwrap()), "ABC VFR N0100 F050");
        assert_eq!(format!("{}", ers.element_at(4).unwrap()), "XYZ IFR N0200 F100");
        assert_eq!(ers.last_element().rules(), Rules::Ifr);
    }

    #[test]
    fn lat_long_point_closes_a_break_just_like_a_named_point() {
        let ers = parse_f15(
            "N0450M0825 00N000E B9 00N001E VFR IFR 00N001W/N0350F100 01N001W 01S001W 02S001W180060",
        );
        assert_eq!(ers.number_of_errors(), 1);
        assert_eq!(ers.errors()[0].message(), "ATS route 'B9' cannot follow a Lat/Long point");
        let names: Vec<&str> = ers.elements().iter().map(RouteElement::point_name).collect();
        assert_eq!(
            names,
            vec!["ADEP", "00N000E", "00N001E", "VFR", "00N001W", "01N001W", "01S001W", "02S001W180060", "ADES"]
        );
        let vfr_element = ers.elements().iter().find(|e| e.point_name() == "VFR").unwrap();
        assert_eq!(vfr_element.break_text(), Some("IFR"));
        for name in ["00N001W", "01N001W", "01S001W", "02S001W180060"] {
            let element = ers.elements().iter().find(|e| e.point_name() == name).unwrap();
            assert_eq!(element.rules(), Rules::Ifr);
            assert_eq!(element.speed(), "N0350");
            assert_eq!(element.level(), "F100");
        }
        assert_eq!(ers.last_element().rules(), Rules::Ifr);
    }
}
