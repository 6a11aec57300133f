//! NFA builder, equivalence classes and epsilon closure, driven directly
//! through a `Context` the way a rule parser would.

use std::collections::HashSet;

use lexgen::{
    Context, Pattern, RuleSet, ScanConfig,
    automata::{EcLinks, StateType, Transition, closure::ClosureEngine},
};

fn ctx() -> Context {
    Context::new(ScanConfig::default()).expect("default config is valid")
}

#[test]
fn mkeccl_splits_only_touched_classes() {
    let mut links = EcLinks::new(5);
    links.mkeccl(&[2, 4]);
    let n = links.cre8ecs();
    assert_eq!(n.count, 2);
    assert_eq!(&n.class[1..], &[1, 2, 1, 2, 1]);
    assert!(n.representative[1] && n.representative[2]);
    assert!(!n.representative[3] && !n.representative[4] && !n.representative[5]);

    // A superset keeps {2,4} together and only pulls 3 out of {1,3,5}.
    links.mkeccl(&[2, 3, 4]);
    let n = links.cre8ecs();
    assert_eq!(n.count, 3);
    assert_eq!(&n.class[1..], &[1, 2, 3, 2, 1]);
}

#[test]
fn mkechar_makes_a_singleton() {
    let mut links = EcLinks::new(4);
    links.mkechar(3);
    assert!(links.is_head(3));
    assert_eq!(links.next(3), None);
    assert_eq!(links.next(2), Some(4));
    assert_eq!(links.prev(4), Some(2));
    let n = links.cre8ecs();
    assert_eq!(n.count, 2);
    assert_eq!(&n.class[1..], &[1, 1, 2, 1]);
}

#[test]
fn link_tracks_the_final_state() {
    let mut c = ctx();
    c.new_rule(1).unwrap();
    let a = c.mkstate(Transition::Char(b'a'));
    let b = c.mkstate(Transition::Char(b'b'));
    let ab = c.link(a, b).unwrap();
    assert_eq!(ab, a);
    assert_eq!(c.nfa().final_of(ab), b);
    assert_eq!(c.nfa().state(a).trans1, Some(b));
    assert_eq!(c.nfa().state(ab).first, a);
    assert_eq!(c.nfa().state(ab).last, b);
}

#[test]
fn mkor_reuses_a_free_end() {
    let mut c = ctx();
    c.new_rule(1).unwrap();
    let a = c.mkstate(Transition::Char(b'a'));
    let b = c.mkstate(Transition::Char(b'b'));
    let or = c.mkor(a, b).unwrap();
    let nfa = c.nfa();
    let head = nfa.state(or);
    assert_eq!(head.symbol, Transition::Epsilon);
    assert_eq!(head.trans1, Some(a));
    assert_eq!(head.trans2, Some(b));
    // Neither side ends in a free epsilon, so a fresh end was made.
    let end = nfa.final_of(or);
    assert_eq!(nfa.state(a).trans1, Some(end));
    assert_eq!(nfa.state(b).trans1, Some(end));
}

#[test]
fn dupmachine_copies_a_contiguous_fragment() {
    let mut c = ctx();
    c.new_rule(1).unwrap();
    let (m, len) = Pattern::lit("xyz").build(&mut c).unwrap();
    assert_eq!(len, Some(3));
    let before = c.nfa().lastnfa();
    let copy = c.dupmachine(m).unwrap();
    assert_eq!(c.nfa().lastnfa(), before + 3);
    assert_eq!(copy, m + 3);
    assert_eq!(c.nfa().state(copy).symbol, Transition::Char(b'x'));
    assert_eq!(c.nfa().final_of(copy), c.nfa().final_of(m) + 3);
}

#[test]
fn dupmachine_keeps_the_state_type() {
    let mut c = ctx();
    c.new_rule(1).unwrap();
    c.begin_trailing_context();
    let (m, _) = Pattern::lit("xy").build(&mut c).unwrap();
    // A new rule builds Normal states again.
    c.new_rule(2).unwrap();
    let copy = c.dupmachine(m).unwrap();
    let nfa = c.nfa();
    for i in 0..2 {
        assert_eq!(nfa.state(m + i).state_type, StateType::TrailingContext);
        assert_eq!(nfa.state(copy + i).state_type, StateType::TrailingContext);
    }
}

#[test]
fn acceptance_of_an_unknown_state_is_the_jam_answer() {
    let compiled = RuleSet::from_patterns([Pattern::lit("a")])
        .compile(ScanConfig::default())
        .unwrap();
    let dfa = &compiled.dfa;
    assert_eq!(dfa.acceptance(dfa.lastdfa() + 1), &lexgen::automata::Acceptance::Single(None));
    assert_eq!(dfa.acceptance(u32::MAX), dfa.acceptance(0));
    assert_eq!(dfa.target(dfa.lastdfa() + 1, 1), 0);
}

#[test]
fn fixed_lengths_follow_the_pattern_shape() {
    let mut c = ctx();
    c.new_rule(1).unwrap();
    let seq = Pattern::Seq(vec![Pattern::lit("ab"), Pattern::range(b'0', b'9')]);
    assert_eq!(seq.build(&mut c).unwrap().1, Some(3));
    let exact = Pattern::exact(Pattern::lit("ab"), 3);
    assert_eq!(exact.build(&mut c).unwrap().1, Some(6));
    let alt = Pattern::Alt(vec![Pattern::lit("a"), Pattern::lit("b")]);
    assert_eq!(alt.build(&mut c).unwrap().1, None);
    let star = Pattern::star(Pattern::lit("a"));
    assert_eq!(star.build(&mut c).unwrap().1, None);
    let rep = Pattern::repeat(Pattern::lit("a"), 2, Some(2));
    assert_eq!(rep.build(&mut c).unwrap().1, None);
}

#[test]
fn identical_classes_share_an_id() {
    let mut c = ctx();
    c.new_rule(1).unwrap();
    let mut d1 = c.cclinit();
    c.ccladd(&mut d1, b'b');
    c.ccladd(&mut d1, b'a');
    let id1 = c.cclinstal(d1);
    let mut d2 = c.cclinit();
    c.ccladd(&mut d2, b'a');
    c.ccladd(&mut d2, b'b');
    c.ccladd(&mut d2, b'a');
    let id2 = c.cclinstal(d2);
    assert_eq!(id1, id2);
    assert_eq!(c.ccls().len(), 1);
    assert_eq!(c.ccls().reuses(), 1);
    assert_eq!(c.ccls().get(id1).unwrap().members, vec![b'a', b'b']);

    let mut d3 = c.cclinit();
    c.ccladd(&mut d3, b'a');
    c.ccladd(&mut d3, b'b');
    c.cclnegate(&mut d3);
    assert_ne!(c.cclinstal(d3), id1);
}

fn installed(patterns: Vec<Pattern>) -> Context {
    let mut c = ctx();
    RuleSet::from_patterns(patterns).install(&mut c).unwrap();
    c
}

#[test]
fn epsilon_closure_is_idempotent() {
    let c = installed(vec![
        Pattern::star(Pattern::lit("ab")),
        Pattern::Alt(vec![Pattern::lit("a"), Pattern::opt(Pattern::lit("c"))]),
        Pattern::repeat(Pattern::range(b'0', b'9'), 0, Some(3)),
    ]);
    let nfa = c.nfa();
    let mut engine = ClosureEngine::new(nfa.lastnfa() as usize);
    let seed = c.start_conditions()[0].set;

    let mut first = engine.epsclosure(nfa, &[seed]).unwrap();
    let mut again = engine.epsclosure(nfa, &first.states).unwrap();
    first.states.sort_unstable();
    again.states.sort_unstable();
    assert_eq!(first.states, again.states);
    assert_eq!(first.hash, again.hash);
    assert!(!first.accepts.is_empty(), "(ab)* accepts the empty string");
}

#[test]
fn epsilon_closure_ignores_input_order() {
    let c = installed(vec![
        Pattern::plus(Pattern::lit("ab")),
        Pattern::Seq(vec![Pattern::opt(Pattern::lit("x")), Pattern::lit("y")]),
    ]);
    let nfa = c.nfa();
    let mut engine = ClosureEngine::new(nfa.lastnfa() as usize);
    let states: Vec<_> = nfa.iter().map(|(id, _)| id).collect();
    let picks = [states[2], states[states.len() / 2], states[states.len() - 1]];
    let mut rev = picks;
    rev.reverse();

    let mut a = engine.epsclosure(nfa, &picks).unwrap();
    let mut b = engine.epsclosure(nfa, &rev).unwrap();
    a.states.sort_unstable();
    b.states.sort_unstable();
    assert_eq!(a.states, b.states);
    assert_eq!(a.hash, b.hash);
}

#[test]
fn dfa_states_are_unique_sets() {
    let rules = RuleSet::from_patterns([
        Pattern::lit("if"),
        Pattern::Seq(vec![
            Pattern::range(b'a', b'z'),
            Pattern::star(Pattern::class(&[(b'a', b'z'), (b'0', b'9')])),
        ]),
        Pattern::plus(Pattern::range(b'0', b'9')),
        Pattern::Any,
    ]);
    let compiled = rules.compile(ScanConfig::default()).unwrap();
    let mut seen = HashSet::new();
    for (id, st) in compiled.dfa.iter_states() {
        assert!(
            seen.insert(st.nfa_states.clone()),
            "state {id} duplicates an earlier NFA set"
        );
    }
}
