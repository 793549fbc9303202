//! Static, versioned exemplar table keyed by (concept kind, category).
//!
//! Pairs without an entry are reported as missing; callers decide whether to
//! fall back to the generic cross-category exemplars.

use crate::concepts::ConceptKind;
use crate::culture::CulturalCategory;

pub const TEMPLATE_VERSION: &str = "2024.11";

pub struct Template {
    pub concept: ConceptKind,
    pub category: CulturalCategory,
    pub exemplars: &'static [&'static str],
}

static TEMPLATES: &[Template] = &[
    // Recursion
    Template {
        concept: ConceptKind::Recursion,
        category: CulturalCategory::Cricket,
        exemplars: &[
            "A recursive function is like a batting collapse replay: each wicket sends the next batter in, until the base case, the last man, walks out and the innings unwinds.",
            "Counting runs recursively is like the scorer asking the previous over's scorer for their total, all the way back to the first ball.",
        ],
    },
    Template {
        concept: ConceptKind::Recursion,
        category: CulturalCategory::Bollywood,
        exemplars: &[
            "Recursion is a film within a film: the hero watches a movie where a hero watches a movie, until the innermost story ends and each layer finishes its climax.",
            "A base case is the final song before the credits; without it the sequel keeps calling another sequel.",
        ],
    },
    Template {
        concept: ConceptKind::Recursion,
        category: CulturalCategory::Family,
        exemplars: &[
            "Tracing a family tree is recursion: to know your ancestors, ask your parents about theirs, until you reach the eldest name everyone remembers.",
            "Each generation hands its answer back down, just like return values flowing back through recursive calls.",
            "The base case is the great-grandparent nobody can ask about anymore.",
        ],
    },
    Template {
        concept: ConceptKind::Recursion,
        category: CulturalCategory::Traffic,
        exemplars: &[
            "Recursion is an auto driver asking the next driver for directions, who asks the next, until someone actually knows the lane; the answer then travels back.",
            "Without a base case it becomes a roundabout with no exit.",
        ],
    },
    // Function
    Template {
        concept: ConceptKind::Function,
        category: CulturalCategory::Food,
        exemplars: &[
            "A function is a dosa tawa: batter in as the argument, a crisp dosa out as the return value, and the same tawa reused for every order.",
            "Parameters are the ingredients listed in grandmother's recipe; calling the function is cooking it again.",
        ],
    },
    Template {
        concept: ConceptKind::Function,
        category: CulturalCategory::Cricket,
        exemplars: &[
            "A function is a bowler's set delivery: call for a yorker, give the field setting as arguments, and get a predictable ball every time.",
            "The return value is the scoreboard update after the over.",
        ],
    },
    Template {
        concept: ConceptKind::Function,
        category: CulturalCategory::Festivals,
        exemplars: &[
            "A function is the family sweet recipe made every Diwali: same steps, different batch sizes passed in as arguments.",
            "Calling it twice gives two boxes of laddoos, not a different recipe.",
        ],
    },
    // Class
    Template {
        concept: ConceptKind::Class,
        category: CulturalCategory::Bollywood,
        exemplars: &[
            "A class is a film script; each object is a production of it with its own cast filling the roles (attributes).",
            "Inheritance is a remake that keeps the original script and adds new songs.",
        ],
    },
    Template {
        concept: ConceptKind::Class,
        category: CulturalCategory::Cricket,
        exemplars: &[
            "A class is the idea of a 'batter': every player object has a name, a strike rate and a shot method.",
            "A subclass like 'wicketkeeper-batter' inherits batting and adds keeping gloves.",
        ],
    },
    Template {
        concept: ConceptKind::Class,
        category: CulturalCategory::Family,
        exemplars: &[
            "A class is the family surname and its traditions; each child is an object with its own first name.",
            "Children inherit the family recipes (methods) but can override how they cook them.",
        ],
    },
    // Data structures
    Template {
        concept: ConceptKind::DataStructure,
        category: CulturalCategory::Food,
        exemplars: &[
            "An array is a thali: fixed compartments, each found by its position on the plate.",
            "A stack is a pile of rotis: the last one placed is the first one served.",
            "A queue is the line at the chaat stall: first to arrive, first to eat.",
        ],
    },
    Template {
        concept: ConceptKind::DataStructure,
        category: CulturalCategory::Traffic,
        exemplars: &[
            "A queue is the line of cars at a toll booth; nobody jumps ahead.",
            "A linked list is a Mumbai local train: each coach knows only the next one it is coupled to.",
        ],
    },
    Template {
        concept: ConceptKind::DataStructure,
        category: CulturalCategory::Festivals,
        exemplars: &[
            "A hash map is the gift list at a wedding: look up a guest's name and find their gift at once.",
            "A stack is the tower of matkas at Dahi Handi: the top pot must come off first.",
        ],
    },
    // Algorithms
    Template {
        concept: ConceptKind::Algorithm,
        category: CulturalCategory::Cricket,
        exemplars: &[
            "An algorithm is a captain's plan for the death overs: clear steps that decide who bowls and where the field stands.",
            "Binary search is a DRS review that halves the replay frames until the exact moment of impact is found.",
        ],
    },
    Template {
        concept: ConceptKind::Algorithm,
        category: CulturalCategory::Food,
        exemplars: &[
            "An algorithm is a recipe: exact steps that always turn the same ingredients into the same biryani.",
            "Sorting is arranging spice jars from mild to hot so the right one is quick to grab.",
        ],
    },
    // Concurrency
    Template {
        concept: ConceptKind::Concurrency,
        category: CulturalCategory::Traffic,
        exemplars: &[
            "Concurrency is a busy junction: many vehicles move at once, and a traffic signal acts as the mutex deciding who may cross.",
            "A deadlock is four cars at an unsignalled crossing, each waiting for the other to move.",
        ],
    },
    Template {
        concept: ConceptKind::Concurrency,
        category: CulturalCategory::Festivals,
        exemplars: &[
            "Concurrency is a wedding kitchen: several cooks work at once, but only one may use the big kadhai at a time.",
            "A race condition is two aunties adding salt to the same dal without telling each other.",
        ],
    },
    // Loops
    Template {
        concept: ConceptKind::Loop,
        category: CulturalCategory::Cricket,
        exemplars: &[
            "A for loop is an over: exactly six deliveries, then it stops.",
            "A while loop is batting until you are out; nobody knows the count in advance.",
        ],
    },
    Template {
        concept: ConceptKind::Loop,
        category: CulturalCategory::Festivals,
        exemplars: &[
            "A loop is lighting diyas along the balcony: repeat the same step for every lamp until the row ends.",
            "The loop condition is whether any unlit diya remains.",
        ],
    },
    // Variables
    Template {
        concept: ConceptKind::Variable,
        category: CulturalCategory::Food,
        exemplars: &[
            "A variable is a labelled steel dabba: the label stays, the contents can change from rice to dal.",
            "A constant is the salt jar nobody is allowed to refill with sugar.",
        ],
    },
    Template {
        concept: ConceptKind::Variable,
        category: CulturalCategory::Cricket,
        exemplars: &[
            "A variable is the scoreboard's 'runs' slot: the label is fixed, the number keeps changing.",
            "Assignment is the scorer writing the new total after each ball.",
        ],
    },
];

/// Category-neutral exemplars used when a pair has no template.
static GENERIC: &[(ConceptKind, &[&str])] = &[
    (
        ConceptKind::Class,
        &[
            "A class is a blueprint; objects are the houses built from it.",
            "Inheritance lets a new blueprint reuse an old one and add rooms.",
        ],
    ),
    (
        ConceptKind::Function,
        &[
            "A function is a machine: inputs go in, a result comes out, and it can be reused.",
            "Arguments are what you hand the machine each time you use it.",
        ],
    ),
    (
        ConceptKind::Recursion,
        &[
            "Recursion is solving a problem by solving a smaller copy of the same problem.",
            "The base case is the smallest copy, answered directly without asking further.",
        ],
    ),
    (
        ConceptKind::DataStructure,
        &[
            "A data structure is a way of arranging things so the ones you need are quick to find.",
            "A stack serves the newest item first; a queue serves the oldest first.",
        ],
    ),
    (
        ConceptKind::Algorithm,
        &[
            "An algorithm is a precise list of steps that always solves a task.",
            "Binary search repeatedly halves the search space.",
        ],
    ),
    (
        ConceptKind::Concurrency,
        &[
            "Concurrency is several tasks making progress at the same time.",
            "A mutex is a single key that one worker holds at a time.",
        ],
    ),
    (
        ConceptKind::Loop,
        &[
            "A loop repeats the same step while a condition holds.",
            "A for loop knows its count in advance; a while loop does not.",
        ],
    ),
    (
        ConceptKind::Variable,
        &[
            "A variable is a labelled box whose contents may change.",
            "Assignment puts a new value in the box.",
        ],
    ),
];

/// Exemplars for a (concept, category) pair, if the table has them.
pub fn lookup(concept: ConceptKind, category: CulturalCategory) -> Option<&'static Template> {
    TEMPLATES
        .iter()
        .find(|t| t.concept == concept && t.category == category)
}

/// Category-neutral exemplars for a concept kind.
pub fn generic(concept: ConceptKind) -> &'static [&'static str] {
    GENERIC
        .iter()
        .find(|(kind, _)| *kind == concept)
        .map(|(_, exemplars)| *exemplars)
        .unwrap_or(&[])
}
