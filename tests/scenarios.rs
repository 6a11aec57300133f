//! Small hand-checked rule sets and the DFA they must produce.

use lexgen::{
    Context, Pattern, RuleDef, RuleSet, ScanConfig,
    automata::{AcceptNum, Acceptance, RuleKind, TRAILING_HEAD_MASK, TRAILING_MASK},
    pattern::StartConditionDef,
    tables::{self, AcceptTables},
};

fn seven_bit() -> ScanConfig {
    ScanConfig {
        csize: 128,
        ..ScanConfig::default()
    }
}

#[test]
fn literal_alternation() {
    let rules = RuleSet::from_patterns([Pattern::lit("a"), Pattern::lit("b")]);
    let c = rules.compile(seven_bit()).unwrap();
    let dfa = &c.dfa;

    // a, b, and everything else.
    assert_eq!(dfa.numecs, 3);
    // Plain and BOL start state, end of buffer, one state per rule.
    assert_eq!(dfa.num_start_states, 3);
    assert_eq!(dfa.end_of_buffer_state, Some(3));
    assert_eq!(dfa.lastdfa(), 5);

    let ea = c.tables.ec_of(b'a');
    let eb = c.tables.ec_of(b'b');
    let other = c.tables.ec_of(b'z');
    for start in [1, 2] {
        let sa = dfa.target(start, ea);
        let sb = dfa.target(start, eb);
        assert!(sa > 3 && sb > 3 && sa != sb);
        assert_eq!(dfa.acceptance(sa), &Acceptance::Single(Some(1)));
        assert_eq!(dfa.acceptance(sb), &Acceptance::Single(Some(2)));
        assert_eq!(dfa.target(start, other), 0);
        for ec in 1..=dfa.numecs {
            assert_eq!(dfa.target(sa, ec), 0);
            assert_eq!(dfa.target(sb, ec), 0);
        }
    }
}

#[test]
fn literal_alternation_over_two_symbols() {
    let cfg = ScanConfig {
        csize: 2,
        ..ScanConfig::default()
    };
    let rules = RuleSet::from_patterns([Pattern::Byte(0), Pattern::Byte(1)]);
    let c = rules.compile(cfg).unwrap();
    let dfa = &c.dfa;
    assert_eq!(dfa.numecs, 2);
    assert_eq!(dfa.lastdfa(), 5);
    assert!(tables::verify(dfa, &c.tables).is_empty());

    let (e0, e1) = (c.tables.ec_of(0), c.tables.ec_of(1));
    assert_ne!(e0, e1);
    let s0 = dfa.target(1, e0);
    let s1 = dfa.target(1, e1);
    assert_eq!(dfa.acceptance(s0), &Acceptance::Single(Some(1)));
    assert_eq!(dfa.acceptance(s1), &Acceptance::Single(Some(2)));
    for s in [s0, s1] {
        assert!(dfa.row(s)[1..].iter().all(|&t| t == 0));
    }
}

#[test]
fn closure_loops_on_one_state() {
    let rules = RuleSet::from_patterns([Pattern::star(Pattern::lit("a"))]);
    let c = rules.compile(seven_bit()).unwrap();
    let dfa = &c.dfa;
    let ea = c.tables.ec_of(b'a');

    assert_eq!(dfa.lastdfa(), 4);
    // Zero occurrences already match.
    assert_eq!(dfa.acceptance(1), &Acceptance::Single(Some(1)));
    let s = dfa.target(1, ea);
    assert_eq!(s, 4);
    assert_eq!(dfa.target(s, ea), s);
    assert_eq!(dfa.acceptance(s), &Acceptance::Single(Some(1)));
    for ec in (1..=dfa.numecs).filter(|&ec| ec != ea) {
        assert_eq!(dfa.target(s, ec), 0);
    }
}

#[test]
fn overlapping_classes_keep_outer_members_apart() {
    let rules = RuleSet::from_patterns([Pattern::range(b'a', b'b'), Pattern::range(b'b', b'c')]);
    let c = rules.compile(ScanConfig::default()).unwrap();
    let ec = |ch| c.tables.ec_of(ch);
    assert_ne!(ec(b'a'), ec(b'c'));
    assert_ne!(ec(b'a'), ec(b'b'));
    assert_ne!(ec(b'b'), ec(b'c'));
    assert_eq!(ec(b'd'), ec(b'z'));
}

#[test]
fn lowest_rule_wins() {
    let rules = RuleSet::from_patterns([
        Pattern::lit("ab"),
        Pattern::plus(Pattern::range(b'a', b'z')),
        Pattern::lit("ab"),
    ]);
    let c = rules.compile(ScanConfig::default()).unwrap();
    let dfa = &c.dfa;
    let s = dfa.target(dfa.target(1, c.tables.ec_of(b'a')), c.tables.ec_of(b'b'));
    assert_eq!(dfa.acceptance(s), &Acceptance::Single(Some(1)));
    let s = dfa.target(1, c.tables.ec_of(b'a'));
    assert_eq!(dfa.acceptance(s), &Acceptance::Single(Some(2)));
    assert!(c.diagnostics.has_warning("rule cannot be matched"));
    let unmatched: Vec<_> = c.diagnostics.warnings().map(|d| d.line).collect();
    assert_eq!(unmatched, vec![Some(3)]);
}

#[test]
fn reject_keeps_the_whole_accepting_set() {
    let rules = RuleSet::from_patterns([
        Pattern::lit("ab"),
        Pattern::plus(Pattern::range(b'a', b'z')),
    ]);
    let cfg = ScanConfig {
        reject: true,
        ..ScanConfig::default()
    };
    let c = rules.compile(cfg).unwrap();
    let dfa = &c.dfa;
    let s = dfa.target(dfa.target(1, c.tables.ec_of(b'a')), c.tables.ec_of(b'b'));
    assert_eq!(
        dfa.acceptance(s),
        &Acceptance::Set(vec![AcceptNum::Rule(1), AcceptNum::Rule(2)])
    );
    match &c.tables.accept {
        AcceptTables::Set { .. } => assert_eq!(c.tables.accept.rules_of(s), vec![1, 2]),
        other => panic!("expected accept sets, got {other:?}"),
    }
}

#[test]
fn exclusive_start_conditions_hide_inclusive_rules() {
    let rules = RuleSet {
        start_conditions: vec![StartConditionDef {
            name: "STR".into(),
            exclusive: true,
        }],
        rules: vec![
            RuleDef::new(Pattern::lit("a")),
            RuleDef::new(Pattern::lit("b")).in_start_conditions(&["STR"]),
            RuleDef::new(Pattern::lit("c")).in_start_conditions(&["*"]),
        ],
    };
    let c = rules.compile(ScanConfig::default()).unwrap();
    let dfa = &c.dfa;
    let ec = |ch| c.tables.ec_of(ch);
    assert_eq!(dfa.num_scs, 2);
    assert_eq!(dfa.end_of_buffer_state, Some(5));

    let initial = dfa.start_state(0, false);
    let string = dfa.start_state(1, false);
    assert_eq!(string, 3);
    assert_ne!(dfa.target(initial, ec(b'a')), 0);
    assert_eq!(dfa.target(initial, ec(b'b')), 0);
    assert_eq!(dfa.target(string, ec(b'a')), 0);
    assert_ne!(dfa.target(string, ec(b'b')), 0);
    for start in [initial, string] {
        let s = dfa.target(start, ec(b'c'));
        assert_eq!(dfa.acceptance(s), &Acceptance::Single(Some(3)));
    }
    assert_eq!(c.tables.start_states, vec![1, 2, 3, 4]);
}

#[test]
fn anchored_rules_only_start_at_line_start() {
    let mut anchored = RuleDef::new(Pattern::lit("a"));
    anchored.bol = true;
    let rules = RuleSet::new(vec![anchored, RuleDef::new(Pattern::lit("b"))]);
    let c = rules.compile(ScanConfig::default()).unwrap();
    let dfa = &c.dfa;
    let ea = c.tables.ec_of(b'a');
    let eb = c.tables.ec_of(b'b');
    assert_eq!(dfa.target(dfa.start_state(0, false), ea), 0);
    let s = dfa.target(dfa.start_state(0, true), ea);
    assert_eq!(dfa.acceptance(s), &Acceptance::Single(Some(1)));
    assert_ne!(dfa.target(dfa.start_state(0, true), eb), 0);
}

#[test]
fn fixed_trailing_context_records_the_head_length() {
    let mut ctx = Context::new(ScanConfig::default()).unwrap();
    let rules = RuleSet::new(vec![
        RuleDef::new(Pattern::lit("ab")).with_trailing(Pattern::lit("c")),
        RuleDef::new(Pattern::plus(Pattern::lit("x"))).with_trailing(Pattern::lit("yz")),
    ]);
    rules.install(&mut ctx).unwrap();

    let r1 = ctx.rule(1).unwrap();
    assert_eq!(r1.kind, RuleKind::Normal);
    assert_eq!(r1.headcnt, Some(2));
    assert_eq!(r1.trailcnt, None);
    let r2 = ctx.rule(2).unwrap();
    assert_eq!(r2.kind, RuleKind::Normal);
    assert_eq!(r2.headcnt, None);
    assert_eq!(r2.trailcnt, Some(2));
    assert!(!ctx.uses_accept_sets());

    let c = ctx.compile().unwrap();
    let dfa = &c.dfa;
    let ec = |ch| c.tables.ec_of(ch);
    // "ab" alone does not match; "abc" does.
    let ab = dfa.target(dfa.target(1, ec(b'a')), ec(b'b'));
    assert!(!dfa.acceptance(ab).is_accepting());
    assert_eq!(
        dfa.acceptance(dfa.target(ab, ec(b'c'))),
        &Acceptance::Single(Some(1))
    );
}

#[test]
fn variable_trailing_context_marks_heads_and_ends() {
    let rules = RuleSet::new(vec![
        RuleDef::new(Pattern::plus(Pattern::lit("a")))
            .with_trailing(Pattern::plus(Pattern::lit("b"))),
    ]);
    let mut ctx = Context::new(ScanConfig::default()).unwrap();
    rules.install(&mut ctx).unwrap();
    assert_eq!(ctx.rule(1).unwrap().kind, RuleKind::Variable);
    assert!(ctx.uses_accept_sets());

    let c = ctx.compile().unwrap();
    let dfa = &c.dfa;
    let ec = |ch| c.tables.ec_of(ch);
    let a = dfa.target(1, ec(b'a'));
    let ab = dfa.target(a, ec(b'b'));
    assert_eq!(
        dfa.acceptance(a),
        &Acceptance::Set(vec![AcceptNum::TrailingHead(1)])
    );
    assert!(matches!(dfa.acceptance(ab), Acceptance::Set(s) if s.contains(&AcceptNum::Rule(1))));
    assert_eq!(c.tables.accept.rules_of(a), vec![1 | TRAILING_HEAD_MASK]);
    assert!(c.tables.accept.rules_of(ab).contains(&(1 | TRAILING_MASK)));
}

#[test]
fn continued_actions_share_the_next_rule() {
    let rules = RuleSet::new(vec![
        RuleDef {
            continued: true,
            ..RuleDef::new(Pattern::lit("a"))
        },
        RuleDef {
            continued: true,
            ..RuleDef::new(Pattern::lit("b"))
        },
        RuleDef::new(Pattern::lit("c")),
        RuleDef::new(Pattern::lit("d")),
    ]);
    let c = rules.compile(ScanConfig::default()).unwrap();
    assert_eq!(c.actions, vec![0, 3, 3, 3, 4]);
    assert_eq!(c.tables.end_of_buffer_action, 5);
}

#[test]
fn end_of_line_is_a_newline_trail() {
    let rules = RuleSet::new(vec![RuleDef {
        eol: true,
        ..RuleDef::new(Pattern::lit("x"))
    }]);
    let c = rules.compile(ScanConfig::default()).unwrap();
    let dfa = &c.dfa;
    let x = dfa.target(1, c.tables.ec_of(b'x'));
    assert!(!dfa.acceptance(x).is_accepting());
    let nl = dfa.target(x, c.tables.ec_of(b'\n'));
    assert_eq!(dfa.acceptance(nl), &Acceptance::Single(Some(1)));
}
