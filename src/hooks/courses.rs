//! Courses visible to the caller, live.

use super::{Hook, QueryFamily};
use crate::models::{Course, Role};
use crate::query::{CourseVisibility, QueryBuilder, QuerySpec};
use crate::store::RemoteStore;
use crate::subscription::Mode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseParams {
    pub identity: Option<String>,
    pub role: Option<Role>,
}

impl CourseParams {
    pub fn new(identity: Option<&str>, role: Option<Role>) -> Self {
        Self {
            identity: identity.map(str::to_string),
            role,
        }
    }
}

pub struct Courses;

impl Courses {
    /// Which courses `params` will see. `Unfiltered` means every course.
    pub fn visibility(params: &CourseParams) -> CourseVisibility {
        QueryBuilder::course_visibility(params.role)
    }
}

impl QueryFamily for Courses {
    type Params = CourseParams;
    type Entity = Course;
    const MODE: Mode = Mode::Live;

    fn build(params: &Self::Params) -> Option<QuerySpec> {
        QueryBuilder::courses(params.identity.as_deref(), params.role)
    }
}

pub type CoursesHook<S> = Hook<S, Courses>;

impl<S: RemoteStore> Hook<S, Courses> {
    pub fn visibility(&self) -> CourseVisibility {
        Courses::visibility(self.params())
    }
}
