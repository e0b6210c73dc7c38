//! Candidate pair generation and type filtering
//!
//! Both steps are pure functions of their inputs. Generation enumerates
//! every ordered pair of distinct mentions of interest in a sentence;
//! filtering keeps the pairs whose subject and object types fit the target
//! relation.

use ise_core::{CandidatePair, EntityMention, EntityType, RelationSpec, Sentence};

/// Generate ordered mention pairs for one tagged sentence.
///
/// Only mentions whose type is in `interest` take part. For mentions in
/// document order `m0, m1, ...` the output is `(m0, m1), (m1, m0), (m0, m2),
/// (m2, m0), ...`, so N mentions of interest yield N×(N−1) pairs. Mentions
/// reported twice for the same token span count once.
pub fn generate_pairs(sentence: &Sentence, interest: &[EntityType]) -> Vec<CandidatePair> {
    let mut mentions: Vec<&EntityMention> = Vec::new();
    for mention in sentence
        .mentions
        .iter()
        .filter(|m| interest.contains(&m.entity_type))
    {
        if !mentions.iter().any(|seen| seen.same_span(mention)) {
            mentions.push(mention);
        }
    }

    if mentions.len() < 2 {
        return Vec::new();
    }

    let tokens = sentence.token_texts();
    let make = |subj: &EntityMention, obj: &EntityMention| CandidatePair {
        tokens: tokens.clone(),
        subj: subj.clone(),
        obj: obj.clone(),
        sentence: sentence.text.clone(),
    };

    let mut pairs = Vec::with_capacity(mentions.len() * (mentions.len() - 1));
    for (i, first) in mentions.iter().enumerate() {
        for second in &mentions[i + 1..] {
            pairs.push(make(first, second));
            pairs.push(make(second, first));
        }
    }
    pairs
}

/// Keep the pairs whose subject and object types are allowed.
///
/// Stable and idempotent; an empty result is a normal outcome.
pub fn filter_pairs(
    pairs: Vec<CandidatePair>,
    subject_types: &[EntityType],
    object_types: &[EntityType],
) -> Vec<CandidatePair> {
    pairs
        .into_iter()
        .filter(|p| {
            subject_types.contains(&p.subj.entity_type) && object_types.contains(&p.obj.entity_type)
        })
        .collect()
}

/// Generate then filter the pairs of one sentence for a relation
pub fn sentence_candidates(sentence: &Sentence, spec: &RelationSpec) -> Vec<CandidatePair> {
    filter_pairs(
        generate_pairs(sentence, &spec.interest_types),
        &spec.subject_types,
        &spec.object_types,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ise_core::{RelationTable, Token};
    use proptest::prelude::*;

    const ALL_TYPES: [EntityType; 8] = [
        EntityType::Person,
        EntityType::Organization,
        EntityType::Location,
        EntityType::City,
        EntityType::StateOrProvince,
        EntityType::Country,
        EntityType::Date,
        EntityType::Misc,
    ];

    /// One token per mention, mention `i` at token `i`
    fn sentence_with(types: &[EntityType]) -> Sentence {
        let tokens = (0..types.len())
            .map(|i| Token::new(format!("e{i}"), i * 3, i * 3 + 2))
            .collect();
        let mentions = types
            .iter()
            .enumerate()
            .map(|(i, t)| EntityMention::new(format!("e{i}"), *t, i, i + 1))
            .collect();
        Sentence::new(
            (0..types.len())
                .map(|i| format!("e{i}"))
                .collect::<Vec<_>>()
                .join(" "),
            tokens,
        )
        .with_mentions(mentions)
    }

    fn bezos_sentence() -> Sentence {
        let text = "Jeff Bezos founded Amazon , but previously worked at Princeton University .";
        let mut tokens = Vec::new();
        let mut offset = 0;
        for word in text.split(' ') {
            tokens.push(Token::new(word, offset, offset + word.len()));
            offset += word.len() + 1;
        }
        Sentence::new(text, tokens).with_mentions(vec![
            EntityMention::new("Jeff Bezos", EntityType::Person, 0, 2),
            EntityMention::new("Amazon", EntityType::Organization, 3, 4),
            EntityMention::new("Princeton University", EntityType::Organization, 9, 11),
        ])
    }

    fn texts(pairs: &[CandidatePair]) -> Vec<(&str, &str)> {
        pairs
            .iter()
            .map(|p| (p.subj.text.as_str(), p.obj.text.as_str()))
            .collect()
    }

    #[test]
    fn test_schools_attended_scenario() {
        let table = RelationTable::builtin();
        let spec = table.spec(1).unwrap();
        let sentence = bezos_sentence();

        let generated = generate_pairs(&sentence, &spec.interest_types);
        assert_eq!(generated.len(), 6);
        assert_eq!(
            texts(&generated),
            vec![
                ("Jeff Bezos", "Amazon"),
                ("Amazon", "Jeff Bezos"),
                ("Jeff Bezos", "Princeton University"),
                ("Princeton University", "Jeff Bezos"),
                ("Amazon", "Princeton University"),
                ("Princeton University", "Amazon"),
            ]
        );

        let filtered = filter_pairs(generated, &spec.subject_types, &spec.object_types);
        assert_eq!(
            texts(&filtered),
            vec![("Jeff Bezos", "Amazon"), ("Jeff Bezos", "Princeton University")]
        );
        assert_eq!(filtered[0].tokens, sentence.token_texts());
        assert_eq!(filtered[0].sentence, sentence.text);
    }

    #[test]
    fn test_interest_types_restrict_mentions() {
        let sentence = sentence_with(&[EntityType::Person, EntityType::Date, EntityType::Organization]);
        let pairs = generate_pairs(&sentence, &[EntityType::Person, EntityType::Organization]);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.subj.entity_type != EntityType::Date));
    }

    #[test]
    fn test_no_mentions_of_interest() {
        let sentence = sentence_with(&[EntityType::Date, EntityType::Misc]);
        assert!(generate_pairs(&sentence, &[EntityType::Person]).is_empty());
        let spec = RelationTable::builtin().spec(2).unwrap().clone();
        assert!(sentence_candidates(&sentence, &spec).is_empty());
    }

    #[test]
    fn test_duplicate_spans_count_once() {
        let sentence = sentence_with(&[EntityType::Person, EntityType::Organization]);
        let mut mentions = sentence.mentions.clone();
        mentions.push(mentions[0].clone());
        let sentence = sentence.with_mentions(mentions);
        assert_eq!(
            generate_pairs(&sentence, &[EntityType::Person, EntityType::Organization]).len(),
            2
        );
    }

    #[test]
    fn test_filter_is_stable() {
        let sentence = sentence_with(&[
            EntityType::Person,
            EntityType::Country,
            EntityType::Person,
            EntityType::City,
        ]);
        let generated = generate_pairs(&sentence, &ALL_TYPES);
        let filtered = filter_pairs(
            generated.clone(),
            &[EntityType::Person],
            &[EntityType::City, EntityType::Country],
        );
        assert_eq!(
            texts(&filtered),
            vec![("e0", "e1"), ("e0", "e3"), ("e2", "e1"), ("e2", "e3")]
        );

        // Survivors appear in the same relative order as in the input
        let positions: Vec<usize> = filtered
            .iter()
            .map(|f| generated.iter().position(|g| g == f).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    fn entity_type() -> impl Strategy<Value = EntityType> {
        prop::sample::select(ALL_TYPES.to_vec())
    }

    proptest! {
        #[test]
        fn prop_pair_count(types in prop::collection::vec(entity_type(), 0..9),
                           interest in prop::collection::vec(entity_type(), 0..5)) {
            let sentence = sentence_with(&types);
            let n = types.iter().filter(|t| interest.contains(t)).count();
            let pairs = generate_pairs(&sentence, &interest);
            prop_assert_eq!(pairs.len(), n * n.saturating_sub(1));
            for pair in &pairs {
                prop_assert!(!pair.subj.same_span(&pair.obj));
            }
        }

        #[test]
        fn prop_filter_idempotent(types in prop::collection::vec(entity_type(), 0..9),
                                  subj in prop::collection::vec(entity_type(), 0..4),
                                  obj in prop::collection::vec(entity_type(), 0..4)) {
            let pairs = generate_pairs(&sentence_with(&types), &ALL_TYPES);
            let once = filter_pairs(pairs, &subj, &obj);
            let twice = filter_pairs(once.clone(), &subj, &obj);
            prop_assert_eq!(once, twice);
        }
    }
}
