//! **Stages and pages** — the fixed script of one screening session.
//!
//! Every stage maps to exactly one static `PageDescriptor`; the page id is a
//! pure function of the stage. Messages that embed live readings are built at
//! transition time from the descriptor text plus the session state.

/// One named point in the session script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Welcome,
    Q1,
    Q2,
    Q3,
    MeasureIntro,
    OximeterIntro,
    OximeterReading,
    OximeterDone,
    BpIntro,
    BpReading,
    BpDone,
    ScaleIntro,
    ScaleReading,
    ScaleDone,
    Recap,
    Sorry,
}

/// Static per-stage configuration.
pub struct PageDescriptor {
    /// UI page identifier, pushed to clients on every transition.
    pub page_id: u32,
    /// Display/speech text. Done pages get the live reading prepended.
    pub message: &'static str,
    /// What confirmation the NLU oracle should look for at this page.
    pub action_context: &'static str,
    /// Answer options; non-empty only for the questionnaire stages.
    pub options: &'static [&'static str],
}

impl Stage {
    pub const ALL: [Stage; 17] = [
        Stage::Idle,
        Stage::Welcome,
        Stage::Q1,
        Stage::Q2,
        Stage::Q3,
        Stage::MeasureIntro,
        Stage::OximeterIntro,
        Stage::OximeterReading,
        Stage::OximeterDone,
        Stage::BpIntro,
        Stage::BpReading,
        Stage::BpDone,
        Stage::ScaleIntro,
        Stage::ScaleReading,
        Stage::ScaleDone,
        Stage::Recap,
        Stage::Sorry,
    ];

    pub fn page_id(self) -> u32 {
        self.descriptor().page_id
    }

    /// Answer-map key for questionnaire stages.
    pub fn question_key(self) -> Option<&'static str> {
        match self {
            Stage::Q1 => Some("q1"),
            Stage::Q2 => Some("q2"),
            Stage::Q3 => Some("q3"),
            _ => None,
        }
    }

    pub fn descriptor(self) -> &'static PageDescriptor {
        match self {
            Stage::Idle => &PageDescriptor {
                page_id: 1,
                message: "Hello, welcome to the self-screening health check pod. \
                    If you would like to start a self-screening, please choose \
                    'Start Self-Screening' on my screen.",
                action_context: "confirming whether they want to begin the health check \
                    (yes to start, no to decline)",
                options: &[],
            },
            Stage::Welcome => &PageDescriptor {
                page_id: 2,
                message: "I'm Vita, your digital health assistant. I'll guide you \
                    step-by-step through the self-screening process and provide you with \
                    a copy of your results to take away. Before we start, please take a \
                    seat and make yourself comfortable. If you are wearing a jacket or \
                    coat, you can remove it now - it will make the process easier. \
                    I will ask a few general lifestyle questions to give the clinical \
                    team some background. You can choose to skip any question, if you \
                    wish. Let me know if you wish to continue.",
                action_context: "confirming they consent to start the session",
                options: &[],
            },
            Stage::Q1 => &PageDescriptor {
                page_id: 3,
                message: "Q1. How frequently do you smoke?\n\
                    \x20 1. I previously smoked but no longer do\n\
                    \x20 2. I do not and have never smoked\n\
                    \x20 3. Occasionally (e.g. weekly or monthly)\n\
                    \x20 4. A few times a day\n\
                    \x20 5. Many times per day",
                action_context: "answering a question about their smoking frequency",
                options: &[
                    "I previously smoked but no longer do",
                    "I do not and have never smoked",
                    "Occasionally (e.g. weekly or monthly)",
                    "A few times a day",
                    "Many times per day",
                ],
            },
            Stage::Q2 => &PageDescriptor {
                page_id: 4,
                message: "Q2. How often do you exercise?\n\
                    \x20 1. Never\n\
                    \x20 2. Rarely (a few times a month)\n\
                    \x20 3. Sometimes (1-2 times a week)\n\
                    \x20 4. Often (3-4 times a week)\n\
                    \x20 5. Daily",
                action_context: "answering a question about their exercise frequency",
                options: &[
                    "Never",
                    "Rarely (a few times a month)",
                    "Sometimes (1-2 times a week)",
                    "Often (3-4 times a week)",
                    "Daily",
                ],
            },
            Stage::Q3 => &PageDescriptor {
                page_id: 5,
                message: "Q3. How many units of alcohol do you drink per week?\n\
                    \x20 1. None\n\
                    \x20 2. 1-7 units\n\
                    \x20 3. 8-14 units\n\
                    \x20 4. 15-21 units\n\
                    \x20 5. More than 21 units",
                action_context: "answering a question about their weekly alcohol consumption",
                options: &[
                    "None",
                    "1-7 units",
                    "8-14 units",
                    "15-21 units",
                    "More than 21 units",
                ],
            },
            Stage::MeasureIntro => &PageDescriptor {
                page_id: 6,
                message: "Great, thank you for answering those questions! Now we'll take \
                    three quick measurements: an oximeter reading, a blood pressure \
                    reading, and your weight. Just say 'continue' when you're happy to begin.",
                action_context: "confirming they are ready to start the measurements",
                options: &[],
            },
            Stage::OximeterIntro => &PageDescriptor {
                page_id: 7,
                message: "Remain seated, and breathe comfortably. Now, place your index \
                    finger inside the oximeter, with your fingernail facing upwards \
                    towards the ceiling. Keep your hand resting on the table. \
                    Say 'ready' when it's in place.",
                action_context: "confirming the oximeter is clipped onto their finger",
                options: &[],
            },
            Stage::OximeterReading => &PageDescriptor {
                page_id: 8,
                message: "Taking oximeter reading... please stay still.",
                action_context: "waiting for oximeter device data",
                options: &[],
            },
            Stage::OximeterDone => &PageDescriptor {
                page_id: 9,
                message: "Great. Thank you! I've recorded your blood oxygen and heart \
                    rate information. Next, we will measure your blood pressure. \
                    Say 'continue' when you're ready for the next measurement.",
                action_context: "confirming they are ready to continue to blood pressure",
                options: &[],
            },
            Stage::BpIntro => &PageDescriptor {
                page_id: 10,
                message: "Next, we'll measure your blood pressure. Please put on the \
                    blood pressure cuff and sit comfortably with your arm resting at \
                    heart level. Say 'ready' when set.",
                action_context: "confirming the blood pressure cuff is on and they are ready",
                options: &[],
            },
            Stage::BpReading => &PageDescriptor {
                page_id: 11,
                message: "Measuring now. Please relax and keep still.",
                action_context: "waiting for blood pressure device data",
                options: &[],
            },
            Stage::BpDone => &PageDescriptor {
                page_id: 12,
                message: "Great. Thank you! I've recorded your blood pressure. Next, we \
                    will measure your weight. Say 'continue' when you're ready for the \
                    final measurement.",
                action_context: "confirming they are ready to continue to the scale",
                options: &[],
            },
            Stage::ScaleIntro => &PageDescriptor {
                page_id: 13,
                message: "Finally, we'll measure your weight. Please step onto the scale. \
                    Once you are on the scale, stand straight and as still as possible. \
                    Say 'ready' when you're on the scale.",
                action_context: "confirming they are standing on the scale",
                options: &[],
            },
            Stage::ScaleReading => &PageDescriptor {
                page_id: 14,
                message: "Taking weight reading... please stand still.",
                action_context: "waiting for scale device data",
                options: &[],
            },
            Stage::ScaleDone => &PageDescriptor {
                page_id: 15,
                message: "Great. Thank you! I've recorded your weight. You can now step \
                    off the scale and sit back down. Say 'continue' to see your summary.",
                action_context: "confirming they are ready to see the recap",
                options: &[],
            },
            Stage::Recap => &PageDescriptor {
                page_id: 16,
                message: "We have now completed all the measurements. Your results are \
                    shown on my screen. Please wait a moment while I also print you a \
                    paper copy to take away.",
                action_context: "reviewing their health check summary",
                options: &[],
            },
            Stage::Sorry => &PageDescriptor {
                page_id: 17,
                message: "Sorry, we weren't able to get a reading. Would you like to try again?",
                action_context: "deciding whether to retry the failed reading",
                options: &[],
            },
        }
    }
}
